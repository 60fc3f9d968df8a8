mod common;

use common::{init_tracing, sample_data, InstrumentedDocument};
use pdf_editor_core::{
    AttachmentsJob, FindJob, FontsJob, JobContext, JobsConfig, LinksJob, RenderFlags, RenderJob,
    SharedDocument, ThumbnailJob,
};
use pdf_editor_scheduler::{Job, JobPriority, JobScheduler, MainContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn document_sections_never_overlap() {
    init_tracing();
    let mut main = MainContext::new();
    let config = JobsConfig::default().with_workers(4).with_font_scan_batch(1);
    let scheduler = JobScheduler::new(main.handle(), config.worker_pool_config()).unwrap();
    let context = JobContext::new(main.handle(), config);

    let pages = ["a b c", "b c d", "c d e", "d e f", "e f g", "f g h"];
    let instrumented = Arc::new(InstrumentedDocument::new(sample_data(&pages)));
    let document: SharedDocument = instrumented.clone();

    let mut jobs: Vec<Arc<dyn Job>> = Vec::new();
    for page in 0..pages.len() {
        jobs.push(Arc::new(RenderJob::new(
            &context,
            document.clone(),
            page,
            0,
            0.5,
            306,
            396,
            RenderFlags::ALL,
        )));
        jobs.push(Arc::new(ThumbnailJob::new(&context, document.clone(), page, 0, 0.1)));
    }
    jobs.push(Arc::new(FindJob::new(&context, document.clone(), 2, "d", false)));
    jobs.push(Arc::new(FontsJob::new(&context, document.clone())));
    jobs.push(Arc::new(LinksJob::new(&context, document.clone())));
    jobs.push(Arc::new(AttachmentsJob::new(&context, document.clone())));

    let finished = Arc::new(AtomicUsize::new(0));
    for job in &jobs {
        let finished = finished.clone();
        job.core().finished_signal().connect(move |_| {
            finished.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.push_job(job.clone(), JobPriority::Low);
    }

    assert!(main.run_until(Duration::from_secs(10), || {
        finished.load(Ordering::SeqCst) == jobs.len()
    }));
    assert!(jobs.iter().all(|job| !job.is_failed()));
    assert!(instrumented.calls() > jobs.len());
    assert_eq!(instrumented.max_active(), 1);

    scheduler.shutdown();
}

#[test]
fn finished_is_not_delivered_after_cancel() {
    init_tracing();
    let mut main = MainContext::new();
    let config = JobsConfig::default().with_workers(1);
    let scheduler = JobScheduler::new(main.handle(), config.worker_pool_config()).unwrap();
    let context = JobContext::new(main.handle(), config);
    let document: SharedDocument = Arc::new(InstrumentedDocument::new(sample_data(&["x"])));

    let job = Arc::new(LinksJob::new(&context, document));
    let events = Arc::new(Mutex::new(Vec::new()));
    let finished = events.clone();
    job.connect_finished(move || finished.lock().unwrap().push("finished"));
    let cancelled = events.clone();
    job.connect_cancelled(move || cancelled.lock().unwrap().push("cancelled"));

    scheduler.push_job(job.clone(), JobPriority::Urgent);

    // The worker finishes the job; its notification waits in the main loop
    let deadline = Instant::now() + Duration::from_secs(5);
    while !job.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    assert!(job.is_finished());

    job.cancel();
    main.run_until_idle();

    assert_eq!(*events.lock().unwrap(), vec!["cancelled"]);

    // A second cancel is a no-op
    job.cancel();
    assert_eq!(events.lock().unwrap().len(), 1);

    scheduler.shutdown();
}

#[test]
fn cancelled_queued_jobs_are_skipped() {
    init_tracing();
    let mut main = MainContext::new();
    let config = JobsConfig::default().with_workers(1);
    let scheduler = JobScheduler::new(main.handle(), config.worker_pool_config()).unwrap();
    let context = JobContext::new(main.handle(), config);

    let instrumented =
        Arc::new(InstrumentedDocument::new(sample_data(&["blocked"])).hold_render());
    let document: SharedDocument = instrumented.clone();

    let blocker = Arc::new(RenderJob::new(
        &context,
        document.clone(),
        0,
        0,
        1.0,
        612,
        792,
        RenderFlags::NONE,
    ));
    scheduler.push_job(blocker.clone(), JobPriority::Urgent);
    assert!(main.run_until(Duration::from_secs(5), || instrumented.render_entered()));

    let queued = Arc::new(ThumbnailJob::new(&context, document, 0, 0, 0.1));
    scheduler.push_job(queued.clone(), JobPriority::Low);
    queued.cancel();
    assert_eq!(scheduler.purge_cancelled(), 1);

    instrumented.release_render();
    assert!(main.run_until(Duration::from_secs(5), || {
        scheduler.stats().jobs_completed == 1
    }));
    assert!(blocker.is_finished());

    let stats = scheduler.stats();
    assert_eq!(stats.jobs_submitted, 2);
    assert_eq!(stats.jobs_skipped, 1);
    assert_eq!(stats.jobs_completed, 1);
    assert!(queued.take_thumbnail().is_none());

    scheduler.shutdown();
}

#[test]
fn fonts_progress_reaches_one_exactly_once() {
    init_tracing();
    let mut main = MainContext::new();
    let config = JobsConfig::default().with_workers(1).with_font_scan_batch(3);
    let scheduler = JobScheduler::new(main.handle(), config.worker_pool_config()).unwrap();
    let context = JobContext::new(main.handle(), config);
    let document: SharedDocument = Arc::new(InstrumentedDocument::new(sample_data(&["x"])));

    let job = Arc::new(FontsJob::new(&context, document));
    let updates = Arc::new(Mutex::new(Vec::new()));
    let seen = updates.clone();
    job.connect_updated(move |progress| seen.lock().unwrap().push(progress));

    scheduler.push_job(job.clone(), JobPriority::High);
    assert!(main.run_until(Duration::from_secs(5), || job.is_finished()));
    main.run_until_idle();

    // 7 fonts scanned 3 at a time
    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 3);
    assert!(updates.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(updates.iter().filter(|progress| **progress == 1.0).count(), 1);
    assert_eq!(*updates.last().unwrap(), 1.0);
    assert_eq!(job.fonts().len(), 7);

    scheduler.shutdown();
}
