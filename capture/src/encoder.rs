use crate::{CaptureError, Frame};

/// Detects faces in a frame and extracts one embedding per face.
///
/// Implementations must be safe for concurrent use.
pub trait FaceEncoder: Send + Sync {
    /// Returns one embedding per detected face; empty when the frame has
    /// no faces.
    fn encode(&self, frame: &Frame) -> Result<Vec<Vec<f32>>, CaptureError>;

    /// Dimension of every returned embedding.
    fn dimension(&self) -> usize;
}

/// Decodes embeddings that were extracted upstream and packed into the
/// frame: `height` rows of `width` little-endian f32 values.
#[derive(Debug, Clone)]
pub struct RawEmbeddingEncoder {
    dim: usize,
}

impl RawEmbeddingEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// Packs `faces` into a frame this encoder can read back.
    pub fn pack(seq: u64, faces: &[Vec<f32>]) -> Frame {
        let width = faces.first().map_or(0, |f| f.len());
        let mut data = Vec::with_capacity(faces.len() * width * 4);
        for face in faces {
            for x in face {
                data.extend_from_slice(&x.to_le_bytes());
            }
        }
        Frame {
            seq,
            width: width as u32,
            height: faces.len() as u32,
            data,
        }
    }
}

impl FaceEncoder for RawEmbeddingEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<Vec<f32>>, CaptureError> {
        if frame.height == 0 {
            return Ok(Vec::new());
        }
        if frame.width as usize != self.dim {
            return Err(CaptureError::Encoder(format!(
                "frame {} has width {}, want {}",
                frame.seq, frame.width, self.dim
            )));
        }
        let want = frame.height as usize * self.dim * 4;
        if frame.data.len() != want {
            return Err(CaptureError::Encoder(format!(
                "frame {} has {} bytes, want {want}",
                frame.seq,
                frame.data.len()
            )));
        }
        Ok(frame
            .data
            .chunks_exact(self.dim * 4)
            .map(|row| {
                row.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_packed_faces() {
        let faces = vec![vec![0.5, -1.0, 2.0], vec![3.0, 4.0, 5.0]];
        let frame = RawEmbeddingEncoder::pack(7, &faces);
        assert_eq!((frame.width, frame.height), (3, 2));
        let enc = RawEmbeddingEncoder::new(3);
        assert_eq!(enc.encode(&frame).unwrap(), faces);
    }

    #[test]
    fn empty_frame_has_no_faces() {
        let enc = RawEmbeddingEncoder::new(128);
        let frame = RawEmbeddingEncoder::pack(1, &[]);
        assert!(enc.encode(&frame).unwrap().is_empty());
    }

    #[test]
    fn wrong_width_is_an_error() {
        let enc = RawEmbeddingEncoder::new(4);
        let frame = RawEmbeddingEncoder::pack(1, &[vec![1.0, 2.0]]);
        assert!(matches!(enc.encode(&frame), Err(CaptureError::Encoder(_))));
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let enc = RawEmbeddingEncoder::new(2);
        let mut frame = RawEmbeddingEncoder::pack(1, &[vec![1.0, 2.0]]);
        frame.data.pop();
        assert!(matches!(enc.encode(&frame), Err(CaptureError::Encoder(_))));
    }
}
