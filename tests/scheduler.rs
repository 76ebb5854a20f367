mod helpers;

use alarm_job::{
    AlarmError, AlarmScheduler, Clock, JobInfo, JobTag, ManualClock, SchedulerConfig,
    SystemClock, error::SchedulerError,
};
use helpers::RecordingAlarmService;

use std::{sync::Arc, time::Duration};

fn scheduler_with_manual_clock() -> (AlarmScheduler, Arc<RecordingAlarmService>, ManualClock) {
    let clock = ManualClock::starting_at(Duration::from_secs(1_000));
    let alarms = Arc::new(RecordingAlarmService::new());
    let scheduler = AlarmScheduler::new(SchedulerConfig::default(), alarms.clone(), clock.handle());
    (scheduler, alarms, clock)
}

fn delayed_job(delay: Duration) -> JobInfo {
    JobInfo::builder().initial_delay(delay).build().unwrap()
}

#[test]
fn test_requires_scheduling() {
    let (scheduler, _, _) = scheduler_with_manual_clock();

    let job_with_delay = delayed_job(Duration::from_millis(1));
    assert!(scheduler.requires_scheduling(&job_with_delay));

    let job = JobInfo::builder().build().unwrap();
    assert!(!scheduler.requires_scheduling(&job));

    let tagged_immediate = JobInfo::builder().tag("now").build().unwrap();
    assert!(!scheduler.requires_scheduling(&tagged_immediate));
}

#[test]
fn test_schedule() -> anyhow::Result<()> {
    let (scheduler, alarms, clock) = scheduler_with_manual_clock();
    let job = delayed_job(Duration::from_millis(1));

    scheduler.schedule(&job)?;

    let pending = alarms.pending();
    assert_eq!(pending.len(), 1);
    let alarm = &pending[0];
    assert_eq!(
        alarm.trigger_at.saturating_duration_since(clock.now()),
        Duration::from_millis(1)
    );
    assert_eq!(alarm.retry_count, 0);
    assert_eq!(alarm.tag, None);
    assert_eq!(JobInfo::from_bundle(&alarm.payload)?, job);
    Ok(())
}

#[test]
fn test_schedule_with_tag() -> anyhow::Result<()> {
    let (scheduler, alarms, _) = scheduler_with_manual_clock();
    let job = JobInfo::builder()
        .initial_delay(Duration::from_millis(1))
        .tag("tag")
        .build()?;

    scheduler.schedule(&job)?;

    let alarm = alarms.pending_for(Some("tag")).expect("alarm for tag");
    assert_eq!(alarm.tag, Some(JobTag::new("tag")));
    assert_eq!(JobInfo::from_bundle(&alarm.payload)?.tag(), Some(&JobTag::new("tag")));
    Ok(())
}

#[test]
fn test_schedule_uses_realtime_monotonic_clock() -> anyhow::Result<()> {
    let clock = SystemClock::new();
    let alarms = Arc::new(RecordingAlarmService::new());
    let scheduler =
        AlarmScheduler::new(SchedulerConfig::default(), alarms.clone(), Arc::new(clock));

    scheduler.schedule(&delayed_job(Duration::from_millis(250)))?;

    let alarm = alarms.pending_for(None).expect("alarm");
    let expected = clock.now().elapsed() + Duration::from_millis(250);
    assert!(expected >= alarm.trigger_at.elapsed());
    assert!(expected - alarm.trigger_at.elapsed() <= Duration::from_millis(100));
    Ok(())
}

#[test]
fn test_reschedule() -> anyhow::Result<()> {
    let (scheduler, alarms, clock) = scheduler_with_manual_clock();
    let job = delayed_job(Duration::from_millis(1));

    // Check 10 retries. The delay should double each time
    let mut delay = Duration::from_millis(10_000);
    for retry_count in 0..10 {
        scheduler.reschedule(&job, retry_count)?;

        let pending = alarms.pending();
        assert_eq!(pending.len(), 1);
        let alarm = &pending[0];
        assert_eq!(alarm.trigger_at.saturating_duration_since(clock.now()), delay);
        assert_eq!(alarm.retry_count, retry_count + 1);
        assert_eq!(JobInfo::from_bundle(&alarm.payload)?, job);

        clock.advance(Duration::from_millis(7));
        delay *= 2;
    }
    assert_eq!(alarms.registrations(), 10);
    Ok(())
}

#[test]
fn test_reschedule_honours_caps() -> anyhow::Result<()> {
    let clock = ManualClock::new();
    let alarms = Arc::new(RecordingAlarmService::new());
    let scheduler = AlarmScheduler::new(
        SchedulerConfig {
            max_backoff: Some(Duration::from_secs(30)),
            max_retries: Some(4),
            ..Default::default()
        },
        alarms.clone(),
        clock.handle(),
    );
    let job = JobInfo::builder().tag("capped").build()?;

    scheduler.reschedule(&job, 3)?;
    let alarm = alarms.pending_for(Some("capped")).expect("alarm");
    assert_eq!(alarm.trigger_at.elapsed(), Duration::from_secs(30));

    let err = scheduler.reschedule(&job, 4).unwrap_err();
    assert!(matches!(err, SchedulerError::RetryLimitReached { .. }));
    assert_eq!(alarms.registrations(), 1);
    Ok(())
}

#[test]
fn test_same_tag_supersedes_and_tags_coexist() -> anyhow::Result<()> {
    let (scheduler, alarms, clock) = scheduler_with_manual_clock();
    let first = JobInfo::builder()
        .tag("a")
        .initial_delay(Duration::from_secs(5))
        .build()?;
    let second = JobInfo::builder()
        .tag("a")
        .initial_delay(Duration::from_secs(9))
        .build()?;
    let other = JobInfo::builder()
        .tag("b")
        .initial_delay(Duration::from_secs(1))
        .build()?;

    scheduler.schedule(&first)?;
    scheduler.schedule(&other)?;
    scheduler.schedule(&second)?;

    assert_eq!(alarms.pending().len(), 2);
    let alarm = alarms.pending_for(Some("a")).expect("alarm for a");
    assert_eq!(
        alarm.trigger_at.saturating_duration_since(clock.now()),
        Duration::from_secs(9)
    );
    assert!(alarms.pending_for(Some("b")).is_some());
    Ok(())
}

#[test]
fn test_payload_round_trip() -> anyhow::Result<()> {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Extras {
        channel: String,
        badge: u32,
    }

    for (tag, delay_ms) in [(None, 0), (Some("tag"), 1), (Some("with space"), 86_400_000)] {
        let mut builder = JobInfo::builder();
        if let Some(tag) = tag {
            builder.tag(tag);
        }
        let job = builder
            .initial_delay(Duration::from_millis(delay_ms))
            .extras(Extras {
                channel: "ch".to_string(),
                badge: 2,
            })?
            .build()?;

        let decoded = JobInfo::from_bundle(&job.to_bundle()?)?;
        assert_eq!(decoded.tag(), job.tag());
        assert_eq!(decoded.initial_delay(), Duration::from_millis(delay_ms));
        assert_eq!(decoded.extras::<Extras>()?, job.extras::<Extras>()?);
    }
    Ok(())
}

#[test]
fn test_rejected_request_surfaces_error() {
    let (scheduler, alarms, _) = scheduler_with_manual_clock();
    alarms.reject_with(AlarmError::QuotaExceeded(500));
    let job = JobInfo::builder()
        .tag("tag")
        .initial_delay(Duration::from_millis(1))
        .build()
        .unwrap();

    let err = scheduler.schedule(&job).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::AlarmRejected(AlarmError::QuotaExceeded(500))
    ));

    alarms.reject_with(AlarmError::PermissionDenied);
    let err = scheduler.reschedule(&job, 0).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::AlarmRejected(AlarmError::PermissionDenied)
    ));

    assert!(alarms.pending().is_empty());
    assert_eq!(alarms.registrations(), 0);

    alarms.accept();
    assert!(scheduler.schedule(&job).is_ok());
    assert_eq!(alarms.pending().len(), 1);
}
