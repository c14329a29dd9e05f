use std::sync::Arc;

use facetriage_store::{BlobStore, Identity};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::codec::{self, TEMPLATE_FILE};
use crate::template::Template;
use crate::TemplateError;

/// Immutable, point-in-time view of the registry.
///
/// Templates are ordered by enrollment sequence.
#[derive(Debug, Clone)]
pub struct TemplateSnapshot {
    dim: usize,
    templates: Vec<Arc<Template>>,
    next_seq: u64,
}

impl TemplateSnapshot {
    fn empty(dim: usize) -> Self {
        Self {
            dim,
            templates: Vec::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn from_parts(dim: usize, templates: Vec<Template>, next_seq: u64) -> Self {
        Self {
            dim,
            templates: templates.into_iter().map(Arc::new).collect(),
            next_seq,
        }
    }

    /// Embedding dimension shared by every vector.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Templates in enrollment order.
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter().map(|t| t.as_ref())
    }

    /// `(identity, representative vector)` pairs in enrollment order.
    pub fn entries(&self) -> impl Iterator<Item = (&Identity, &[f32])> {
        self.templates
            .iter()
            .map(|t| (&t.identity, t.representative.as_slice()))
    }

    pub fn get(&self, identity: &str) -> Option<&Template> {
        self.templates()
            .find(|t| t.identity.as_str() == identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.get(identity).is_some()
    }

    fn position(&self, identity: &str) -> Option<usize> {
        self.templates
            .iter()
            .position(|t| t.identity.as_str() == identity)
    }
}

/// Owns the enrolled templates of every identity.
///
/// Thread-safe: readers take a [`TemplateSnapshot`] (an `Arc` clone) and
/// never block on writers for longer than a pointer copy. Writers are
/// serialized, build the next snapshot off-lock, persist it, and only then
/// publish it.
pub struct TemplateStore {
    dim: usize,
    blob: Arc<dyn BlobStore>,
    current: RwLock<Arc<TemplateSnapshot>>,
    writer: Mutex<()>,
}

impl TemplateStore {
    /// Loads the registry from `blob`, or starts empty if nothing was saved.
    ///
    /// A present but unreadable registry is an error, never an empty store.
    pub fn open(dim: usize, blob: Arc<dyn BlobStore>) -> Result<Self, TemplateError> {
        if dim == 0 {
            return Err(TemplateError::DimensionMismatch {
                expected: 1,
                got: 0,
            });
        }
        let snapshot = Self::load(dim, blob.as_ref())?;
        Ok(Self {
            dim,
            blob,
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        })
    }

    fn load(dim: usize, blob: &dyn BlobStore) -> Result<TemplateSnapshot, TemplateError> {
        match blob.load(TEMPLATE_FILE)? {
            Some(data) => {
                let snapshot = codec::decode(&data, dim)?;
                info!(templates = snapshot.len(), dim, "loaded face templates");
                Ok(snapshot)
            }
            None => {
                warn!(file = TEMPLATE_FILE, "no template registry found, starting empty");
                Ok(TemplateSnapshot::empty(dim))
            }
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns the current consistent view of the registry.
    pub fn snapshot(&self) -> Arc<TemplateSnapshot> {
        self.current.read().clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the identity's template.
    pub fn get(&self, identity: &str) -> Option<Template> {
        self.snapshot().get(identity).cloned()
    }

    /// Enrolled identities in enrollment order.
    pub fn identities(&self) -> Vec<Identity> {
        self.snapshot().templates().map(|t| t.identity.clone()).collect()
    }

    /// Registers a new identity. Registration is create-only.
    pub fn enroll(
        &self,
        identity: Identity,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), TemplateError> {
        self.validate(&embeddings)?;
        self.mutate(|cur| {
            if cur.contains(identity.as_str()) {
                return Err(TemplateError::DuplicateIdentity(identity.clone()));
            }
            let mut next = cur.clone();
            let count = embeddings.len();
            next.templates.push(Arc::new(Template::new(
                identity.clone(),
                next.next_seq,
                embeddings,
            )));
            next.next_seq += 1;
            info!(identity = %identity, embeddings = count, "enrolled identity");
            Ok(next)
        })
    }

    /// Atomically replaces the embeddings of an enrolled identity.
    ///
    /// The identity keeps its enrollment sequence.
    pub fn replace(
        &self,
        identity: &Identity,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), TemplateError> {
        self.validate(&embeddings)?;
        self.mutate(|cur| {
            let idx = cur
                .position(identity.as_str())
                .ok_or_else(|| TemplateError::NotFound(identity.clone()))?;
            let mut next = cur.clone();
            let seq = next.templates[idx].seq;
            let count = embeddings.len();
            next.templates[idx] = Arc::new(Template::new(identity.clone(), seq, embeddings));
            info!(identity = %identity, embeddings = count, "re-enrolled identity");
            Ok(next)
        })
    }

    /// Adds embeddings to an enrolled identity and recomputes its centroid.
    pub fn append(
        &self,
        identity: &Identity,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<(), TemplateError> {
        self.validate(&embeddings)?;
        self.mutate(|cur| {
            let idx = cur
                .position(identity.as_str())
                .ok_or_else(|| TemplateError::NotFound(identity.clone()))?;
            let mut next = cur.clone();
            let old = &next.templates[idx];
            let mut all = old.embeddings.clone();
            all.extend(embeddings);
            let total = all.len();
            next.templates[idx] = Arc::new(Template::new(identity.clone(), old.seq, all));
            info!(identity = %identity, embeddings = total, "appended embeddings");
            Ok(next)
        })
    }

    /// Deletes an identity's template.
    pub fn remove(&self, identity: &Identity) -> Result<(), TemplateError> {
        self.mutate(|cur| {
            let idx = cur
                .position(identity.as_str())
                .ok_or_else(|| TemplateError::NotFound(identity.clone()))?;
            let mut next = cur.clone();
            next.templates.remove(idx);
            info!(identity = %identity, "removed identity template");
            Ok(next)
        })
    }

    /// Writes the current snapshot to the blob store.
    pub fn save(&self) -> Result<(), TemplateError> {
        let _w = self.writer.lock();
        let snapshot = self.snapshot();
        self.blob.save(TEMPLATE_FILE, &codec::encode(&snapshot)?)?;
        Ok(())
    }

    /// Discards in-memory state and reloads from the blob store.
    pub fn reload(&self) -> Result<(), TemplateError> {
        let _w = self.writer.lock();
        let snapshot = Self::load(self.dim, self.blob.as_ref())?;
        *self.current.write() = Arc::new(snapshot);
        Ok(())
    }

    fn validate(&self, embeddings: &[Vec<f32>]) -> Result<(), TemplateError> {
        if embeddings.is_empty() {
            return Err(TemplateError::EmptyEnrollment);
        }
        for (index, e) in embeddings.iter().enumerate() {
            if e.len() != self.dim {
                return Err(TemplateError::DimensionMismatch {
                    expected: self.dim,
                    got: e.len(),
                });
            }
            if e.iter().any(|x| !x.is_finite()) {
                return Err(TemplateError::InvalidEmbedding { index });
            }
        }
        Ok(())
    }

    /// Runs one writer transaction: derive, persist, publish.
    fn mutate<F>(&self, f: F) -> Result<(), TemplateError>
    where
        F: FnOnce(&TemplateSnapshot) -> Result<TemplateSnapshot, TemplateError>,
    {
        let _w = self.writer.lock();
        let cur = self.snapshot();
        let next = f(&cur)?;
        self.blob.save(TEMPLATE_FILE, &codec::encode(&next)?)?;
        *self.current.write() = Arc::new(next);
        Ok(())
    }
}

impl std::fmt::Debug for TemplateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateStore")
            .field("dim", &self.dim)
            .field("templates", &self.len())
            .finish()
    }
}
