//! Tests for the Session module

use super::*;
use crate::domain::reading::DeviceTopics;
use crate::domain::record::ProfileIdentity;
use crate::domain::types::{
    BendRadius, CurveSide, DivisionId, EncoderSide, EnvelopePoint, ImageSide, ProfileKind,
    ScanPoint,
};
use crate::infra::config::Deadzone;
use crate::services::envelope::EnvelopeStore;
use crate::services::profile::Profile;
use tempfile::tempdir;
use tokio::time::{timeout, Duration};

/// 20 x 20 box standing on the rail plane, for division A only
fn envelope_store() -> Arc<EnvelopeStore> {
    let points = [(-10.0, 0.0), (-10.0, 20.0), (10.0, 20.0), (10.0, 0.0)]
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| EnvelopePoint { id: i as i64 + 1, x, y, division: DivisionId::A })
        .collect::<Vec<_>>();
    Arc::new(EnvelopeStore::from_points(points))
}

fn create_test_session(config: Config) -> Session {
    let mut profile = Profile::new(
        ProfileIdentity::new("Red Line", "2", "1204+50", ProfileKind::Verification),
        envelope_store(),
    );
    profile.set_division(DivisionId::A);
    profile.set_curve_side(CurveSide::Inside);
    profile.mark_saved();
    Session::new(profile.into_shared(), config, Arc::new(Metrics::new()))
}

/// Dead-zone well away from the test envelope
fn test_config() -> Config {
    Config::default().with_deadzone(Deadzone { x_min: 100.0, x_max: 110.0, y_min: 0.0, y_max: 10.0 })
}

fn scan_point(x: f64, y: f64) -> SensorReading {
    SensorReading::ScanPoint(ScanPoint::new(x, y))
}

#[test]
fn test_encoder_readings_cascade() {
    let mut session = create_test_session(test_config());

    let outcome = session.process_reading(SensorReading::Encoder {
        side: EncoderSide::Left,
        angle_deg: 174.0,
    });
    assert_eq!(outcome, Outcome::Applied(Recompute::Geometry));
    assert!(session.profile().lock().bend_radius().is_none());

    session.process_reading(SensorReading::Encoder { side: EncoderSide::Right, angle_deg: 6.0 });
    let profile = session.profile().lock();
    assert!(matches!(profile.bend_radius(), Some(BendRadius::Inside { .. })));
    assert!(profile.changes_made());
    assert_eq!(session.metrics.envelope_recomputes(), 2);
}

#[test]
fn test_super_elevation_rebuilds_envelope_only() {
    let mut session = create_test_session(test_config());
    let before = session.profile().lock().envelope_revision();

    let outcome = session.process_reading(SensorReading::SuperElevation { angle_deg: 2.0 });
    assert_eq!(outcome, Outcome::Applied(Recompute::Envelope));
    assert_eq!(session.profile().lock().envelope_revision(), before + 1);
}

#[test]
fn test_deadzone_points_are_dropped() {
    let mut session = create_test_session(Config::default());

    assert_eq!(session.process_reading(scan_point(0.0, 5.0)), Outcome::Dropped);
    assert_eq!(session.process_reading(scan_point(0.0, 15.0)), Outcome::Applied(Recompute::Nothing));

    assert_eq!(session.accepted_points(), 1);
    assert_eq!(session.metrics.deadzone_dropped(), 1);
    assert_eq!(session.metrics.scan_points_total(), 1);
    assert_eq!(session.profile().lock().scan_points(), &[ScanPoint::new(0.0, 15.0)]);
}

#[test]
fn test_violations_counted_as_points_arrive() {
    let mut session = create_test_session(test_config());

    session.process_reading(scan_point(0.0, 5.0));
    session.process_reading(scan_point(30.0, 5.0));
    session.process_reading(scan_point(-5.0, 15.0));

    assert_eq!(session.metrics.violations_total(), 2);
    assert_eq!(session.metrics.readings_total(), 3);
}

#[test]
fn test_scan_complete_summary() {
    let mut session = create_test_session(test_config().with_progress_every(1));

    session.process_reading(scan_point(0.0, 5.0));
    session.process_reading(scan_point(30.0, 5.0));

    match session.process_reading(SensorReading::ScanComplete) {
        Outcome::ScanComplete(summary) => {
            assert_eq!(summary.evaluated, 2);
            assert_eq!(summary.violations, 1);
            assert!(summary.violation);
            assert_eq!(summary.min_horizontal, Some(0.0));
        }
        other => panic!("expected scan completion, got {:?}", other),
    }
    assert_eq!(session.metrics.scans_completed(), 1);
}

#[test]
fn test_scan_complete_saves_profile() {
    let dir = tempdir().unwrap();
    let records = dir.path().join("profiles.jsonl");
    let reports = dir.path().join("reports");
    let egress = Egress::new(records.to_str().unwrap(), reports.to_str().unwrap());
    let mut session = create_test_session(test_config()).with_egress(egress.clone());

    session.process_reading(scan_point(30.0, 5.0));
    assert!(session.profile().lock().changes_made());

    session.process_reading(SensorReading::ScanComplete);

    let profile = session.profile().lock();
    assert!(!profile.changes_made());
    assert!(records.exists());
    assert!(egress.report_path(profile.id()).exists());
}

#[test]
fn test_image_reading_stored() {
    let mut session = create_test_session(test_config());
    let outcome = session.process_reading(SensorReading::Image {
        side: ImageSide::Inside,
        data: vec![0xff, 0xd8],
    });
    assert_eq!(outcome, Outcome::Applied(Recompute::Nothing));
    assert_eq!(session.profile().lock().image(ImageSide::Inside), Some(&[0xff, 0xd8][..]));
}

#[test]
fn test_no_envelope_means_no_violations() {
    let profile = Profile::new(
        ProfileIdentity::new("Red Line", "2", "1204+50", ProfileKind::Verification),
        envelope_store(),
    );
    let mut session = Session::new(profile.into_shared(), test_config(), Arc::new(Metrics::new()));

    session.process_reading(scan_point(0.0, 5.0));
    match session.process_reading(SensorReading::ScanComplete) {
        Outcome::ScanComplete(summary) => {
            assert!(summary.envelope_missing);
            assert_eq!(summary.evaluated, 0);
        }
        other => panic!("expected scan completion, got {:?}", other),
    }
    assert_eq!(session.metrics.violations_total(), 0);
}

#[tokio::test]
async fn test_run_consumes_until_channel_closed() {
    let mut session = create_test_session(test_config());
    let (reading_tx, reading_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let topics = DeviceTopics::default();
    for (topic, payload) in [("/data/LEA", "174"), ("/data/REA", "6"), ("/data/SP", "30|5")] {
        let reading = SensorReading::parse(&topics, topic, payload.as_bytes()).unwrap().unwrap();
        reading_tx.send(reading).await.unwrap();
    }
    drop(reading_tx);

    timeout(Duration::from_secs(1), session.run(reading_rx, shutdown_rx)).await.unwrap();

    let profile = session.profile().lock();
    assert!(matches!(profile.bend_radius(), Some(BendRadius::Inside { .. })));
    assert_eq!(profile.scan_points().len(), 1);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let mut session = create_test_session(test_config());
    let (_reading_tx, reading_rx) = mpsc::channel::<SensorReading>(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    shutdown_tx.send(true).unwrap();
    timeout(Duration::from_secs(1), session.run(reading_rx, shutdown_rx)).await.unwrap();
    assert_eq!(session.accepted_points(), 0);
}
