use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use facetriage_capture::{
    CaptureConfig, MatchEvent, Pipeline, RawEmbeddingEncoder, ReplayOpener, Scene, SceneFrame,
};
use facetriage_records::{Availability, Doctor, NewAppointment, Patient, RecordStore};
use facetriage_store::{Identity, MemoryStore};
use facetriage_template::{MatchOutcome, Matcher, MatcherConfig, Metric, TemplateStore};
use tokio_util::sync::CancellationToken;

use crate::{
    AlertSink, ChannelSink, CollectingSink, DebounceConfig, RecordStatus, TriageError,
    TriageSession,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn id(s: &str) -> Identity {
    Identity::new(s).unwrap()
}

/// Monday 2026-10-19 08:00.
fn clinic_morning() -> NaiveDateTime {
    day(19).and_hms_opt(8, 0, 0).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
}

fn records() -> Arc<RecordStore> {
    records_in(MemoryStore::new())
}

fn records_in(blob: MemoryStore) -> Arc<RecordStore> {
    let store = RecordStore::open(Arc::new(blob)).unwrap();
    let mut p1 = Patient::new(id("P1"));
    p1.age = Some(61);
    p1.allergies = vec!["penicillin".into(), "latex".into()];
    p1.history = "type 2 diabetes".into();
    store.create_patient(p1).unwrap();
    store.create_patient(Patient::new(id("P2"))).unwrap();
    store
        .create_doctor(Doctor {
            identity: id("D1"),
            specialty: "Cardiology".into(),
            contact: "ext. 12".into(),
            availability: Availability {
                days: vec![Weekday::Mon, Weekday::Thu],
                start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            },
        })
        .unwrap();
    Arc::new(store)
}

fn book(store: &RecordStore, patient: &str, at: NaiveDateTime) -> u64 {
    store
        .create_appointment_at(
            NewAppointment {
                patient: id(patient),
                doctor: id("D1"),
                scheduled_at: at,
                reason: "review".into(),
            },
            day(18).and_hms_opt(0, 0, 0).unwrap(),
        )
        .unwrap()
        .id
}

fn session(records: Arc<RecordStore>, sink: Arc<dyn AlertSink>, cooldown_ms: u64) -> TriageSession {
    TriageSession::new(
        &DebounceConfig {
            window: 5,
            min_hits: 3,
            cooldown_ms,
            stale_after_ms: 0,
        },
        records,
        sink,
    )
    .unwrap()
    .with_clock(clinic_morning)
}

fn known(name: &str, frame: u64, at: Instant) -> MatchEvent {
    MatchEvent::new(
        frame,
        0,
        MatchOutcome::Known {
            identity: id(name),
            distance: 0.2,
        },
        at,
    )
}

fn unknown(frame: u64, at: Instant) -> MatchEvent {
    MatchEvent::new(frame, 0, MatchOutcome::Unknown { nearest: Some(0.9) }, at)
}

// ---------------------------------------------------------------------------
// Debounce through the session
// ---------------------------------------------------------------------------

#[test]
fn a_then_b_confirms_only_a() {
    let sink = Arc::new(CollectingSink::new());
    let mut s = session(records(), sink.clone(), 30_000);
    let t0 = Instant::now();
    for (i, name) in ["P1", "P1", "P1", "P2", "P2"].iter().enumerate() {
        s.handle(&known(name, i as u64 + 1, t0 + Duration::from_millis(100 * i as u64)))
            .unwrap();
    }
    let alerts = sink.take();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].identity, "P1");
    assert_eq!(alerts[0].frame, 3);
    assert_eq!(alerts[0].hits, 3);
}

#[test]
fn cooldown_controls_realerting() {
    let t0 = Instant::now();
    let feed = |s: &mut TriageSession, start: Duration| {
        for i in 0..3u64 {
            s.handle(&known("P1", i, t0 + start + Duration::from_millis(10 * i)))
                .unwrap();
        }
    };

    // Second burst inside the cool-down.
    let sink = Arc::new(CollectingSink::new());
    let mut s = session(records(), sink.clone(), 1_000);
    feed(&mut s, Duration::ZERO);
    feed(&mut s, Duration::from_millis(500));
    assert_eq!(sink.len(), 1);

    // Second burst after the cool-down.
    let sink = Arc::new(CollectingSink::new());
    let mut s = session(records(), sink.clone(), 1_000);
    feed(&mut s, Duration::ZERO);
    feed(&mut s, Duration::from_millis(1_500));
    assert_eq!(sink.len(), 2);
}

#[test]
fn unknown_faces_are_counted_not_alerted() {
    let sink = Arc::new(CollectingSink::new());
    let mut s = session(records(), sink.clone(), 30_000);
    let t0 = Instant::now();
    s.handle(&known("P1", 1, t0)).unwrap();
    s.handle(&unknown(2, t0)).unwrap();
    s.handle(&unknown(3, t0)).unwrap();
    s.handle(&known("P1", 4, t0)).unwrap();
    let alert = s.handle(&known("P1", 5, t0)).unwrap();
    assert!(alert.is_some());
    let stats = s.stats();
    assert_eq!((stats.events, stats.unknown, stats.alerts), (5, 2, 1));
}

// ---------------------------------------------------------------------------
// Alert content
// ---------------------------------------------------------------------------

#[test]
fn alert_lists_allergies_and_scheduled_appointments() {
    let records = records();
    let today = book(&records, "P1", day(19).and_hms_opt(10, 30, 0).unwrap());
    let later = book(&records, "P1", day(22).and_hms_opt(9, 0, 0).unwrap());
    let canceled = book(&records, "P1", day(20).and_hms_opt(9, 0, 0).unwrap());
    records.cancel_appointment(canceled).unwrap();
    book(&records, "P2", day(19).and_hms_opt(11, 0, 0).unwrap());

    let sink = Arc::new(CollectingSink::new());
    let mut s = session(records, sink.clone(), 30_000);
    let t0 = Instant::now();
    for f in 0..3 {
        s.handle(&known("P1", f, t0)).unwrap();
    }
    let alert = sink.take().pop().unwrap();

    assert_eq!(alert.record, RecordStatus::Found);
    assert!(alert.critical_allergy);
    assert_eq!(alert.allergies, vec!["penicillin", "latex"]);
    assert_eq!(alert.patient.as_ref().unwrap().age, Some(61));
    let appts: Vec<(u64, bool)> = alert.appointments.iter().map(|a| (a.id, a.today)).collect();
    assert_eq!(appts, vec![(today, true), (later, false)]);
    assert_eq!(alert.confirmed_at, clinic_morning());
}

#[test]
fn patient_without_allergies_is_not_critical() {
    let sink = Arc::new(CollectingSink::new());
    let mut s = session(records(), sink.clone(), 30_000);
    let t0 = Instant::now();
    for f in 0..3 {
        s.handle(&known("P2", f, t0)).unwrap();
    }
    let alert = sink.take().pop().unwrap();
    assert!(!alert.critical_allergy);
    assert!(alert.appointments.is_empty());
}

#[test]
fn deleted_record_gives_degraded_alert() {
    let records = records();
    book(&records, "P1", day(19).and_hms_opt(10, 0, 0).unwrap());
    records.delete_patient(&id("P1")).unwrap();

    let sink = Arc::new(CollectingSink::new());
    let mut s = session(records, sink.clone(), 30_000);
    let t0 = Instant::now();
    for f in 0..3 {
        s.handle(&known("P1", f, t0)).unwrap();
    }
    let alert = sink.take().pop().unwrap();
    assert!(alert.record_missing());
    assert!(alert.patient.is_none());
    assert!(alert.allergies.is_empty());
    // The dangling appointment is still surfaced.
    assert_eq!(alert.appointments.len(), 1);
    assert_eq!(s.stats().degraded_alerts, 1);
}

#[test]
fn alert_reflects_records_edited_elsewhere() {
    let blob = MemoryStore::new();
    let records = records_in(blob.clone());
    let sink = Arc::new(CollectingSink::new());
    let mut s = session(records, sink.clone(), 30_000);

    // Front desk edits P1 and books P2 from its own process.
    let desk = RecordStore::open(Arc::new(blob)).unwrap();
    let mut p1 = desk.get_patient("P1").unwrap();
    p1.allergies = vec!["iodine".into()];
    desk.update_patient(p1).unwrap();
    book(&desk, "P1", day(19).and_hms_opt(11, 0, 0).unwrap());

    let t0 = Instant::now();
    for f in 0..3 {
        s.handle(&known("P1", f, t0)).unwrap();
    }
    let alert = sink.take().pop().unwrap();
    assert_eq!(alert.allergies, vec!["iodine"]);
    assert_eq!(alert.appointments.len(), 1);
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn channel_sink_keeps_newest_alert_when_full() {
    let (sink, mut rx) = ChannelSink::new(1);
    let sink = Arc::new(sink);
    let mut s = session(records(), sink.clone(), 0);
    let t0 = Instant::now();
    // Confirmations at frames 2 and 3; the queue holds one.
    for f in 0..4 {
        s.handle(&known("P1", f, t0 + Duration::from_millis(f))).unwrap();
    }
    assert_eq!(s.stats().alerts, 2);
    assert_eq!(sink.dropped(), 1);

    let kept = rx.recv().await.unwrap();
    assert_eq!(kept.frame, 3);
    assert!(rx.try_recv().is_none());
}

#[tokio::test]
async fn alert_receiver_wakes_on_delivery_and_ends_with_sink() {
    let (sink, mut rx) = ChannelSink::new(4);
    let waiter = tokio::spawn(async move {
        let mut frames = Vec::new();
        while let Some(alert) = rx.recv().await {
            frames.push(alert.frame);
        }
        frames
    });

    let mut s = session(records(), Arc::new(sink), 0);
    let t0 = Instant::now();
    for f in 0..3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        s.handle(&known("P1", f, t0 + Duration::from_millis(f))).unwrap();
    }
    // Dropping the session drops the last handle on the sink.
    drop(s);
    assert_eq!(waiter.await.unwrap(), vec![2]);
}

#[tokio::test]
async fn channel_sink_reports_closed_consumer() {
    let (sink, rx) = ChannelSink::new(4);
    drop(rx);
    let mut s = session(records(), Arc::new(sink), 30_000);
    let t0 = Instant::now();
    s.handle(&known("P1", 0, t0)).unwrap();
    s.handle(&known("P1", 1, t0)).unwrap();
    let err = s.handle(&known("P1", 2, t0)).unwrap_err();
    assert!(matches!(err, TriageError::SinkClosed));
}

// ---------------------------------------------------------------------------
// End to end: replayed camera -> matcher -> triage
// ---------------------------------------------------------------------------

#[test]
fn recognizes_enrolled_patient_from_camera() {
    let dim = 8;
    let v: Vec<f32> = (0..dim).map(|i| (i as f32 * 0.37).sin()).collect();
    let near = |k: usize, delta: f32| -> Vec<f32> {
        let mut x = v.clone();
        x[k] += delta;
        x
    };

    let templates = Arc::new(TemplateStore::open(dim, Arc::new(MemoryStore::new())).unwrap());
    templates
        .enroll(id("P1"), vec![near(0, 0.02), near(1, -0.02), near(2, 0.01)])
        .unwrap();
    templates
        .enroll(id("P2"), vec![v.iter().map(|x| x + 2.0).collect()])
        .unwrap();
    let matcher = Arc::new(
        Matcher::new(
            templates,
            MatcherConfig {
                threshold: 0.4,
                metric: Metric::Euclidean,
            },
        )
        .unwrap(),
    );

    let records = records();
    book(&records, "P1", day(19).and_hms_opt(9, 30, 0).unwrap());

    // Probe within 0.1 of v, with a stranger walking past.
    let scene = Scene {
        interval_ms: Some(2),
        frames: vec![
            SceneFrame {
                faces: vec![vec![9.0; dim]],
                repeat: 2,
            },
            SceneFrame {
                faces: vec![near(3, 0.09)],
                repeat: 6,
            },
        ],
    };
    let pipeline = Pipeline::new(
        Arc::new(ReplayOpener::new(scene, Duration::from_millis(2))),
        Arc::new(RawEmbeddingEncoder::new(dim)),
        matcher,
        CaptureConfig {
            frame_interval_ms: 10,
            read_timeout_ms: 10,
            frame_buffer: 16,
            ..Default::default()
        },
    )
    .unwrap();
    let handle = pipeline.start().unwrap();

    let sink = Arc::new(CollectingSink::new());
    let mut s = session(records, sink.clone(), 30_000);
    let stats = s.run(&handle.events(), &CancellationToken::new()).unwrap();
    let report = handle.stop();

    assert_eq!(report.stats.events_emitted, 8);
    assert_eq!(stats.unknown, 2);
    let alerts = sink.take();
    assert_eq!(alerts.len(), 1, "{alerts:?}");
    let alert = &alerts[0];
    assert_eq!(alert.identity, "P1");
    assert!(alert.distance < 0.1);
    assert_eq!(alert.allergies, vec!["penicillin", "latex"]);
    assert_eq!(alert.appointments.len(), 1);
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[test]
fn alert_json_shape() {
    let records = records();
    book(&records, "P1", day(19).and_hms_opt(10, 30, 0).unwrap());
    let sink = Arc::new(CollectingSink::new());
    let mut s = session(records, sink.clone(), 30_000);
    let t0 = Instant::now();
    for f in 0..3 {
        s.handle(&known("P1", f, t0)).unwrap();
    }
    let alert = sink.take().pop().unwrap();

    let v = serde_json::to_value(&alert).unwrap();
    assert_eq!(v["identity"], "P1");
    assert_eq!(v["record"], "found");
    assert_eq!(v["critical_allergy"], true);
    assert_eq!(v["allergies"][1], "latex");
    assert_eq!(v["appointments"][0]["today"], true);
    assert_eq!(v["appointments"][0]["scheduled_at"], "2026-10-19T10:30:00");
}

#[test]
fn debounce_config_from_yaml() {
    let cfg: DebounceConfig = serde_yaml::from_str("window: 7\nmin_hits: 4\n").unwrap();
    assert_eq!(cfg.window, 7);
    assert_eq!(cfg.cooldown_ms, 30_000);
    cfg.validate().unwrap();

    let cfg: DebounceConfig = serde_yaml::from_str("window: 6\nmin_hits: 3\n").unwrap();
    assert!(matches!(cfg.validate(), Err(TriageError::InvalidConfig(_))));
}
