use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::extract::ExtractionEngine;
use crate::loader;
use crate::ocr::OcrAdapter;
use crate::worker::job::{Job, JobResult};

pub struct WorkerPool {
    job_sender: Sender<Job>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` extraction workers sharing one OCR adapter and
    /// one request deadline.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(
        worker_count: usize,
        confidence_threshold: f32,
        ocr: Option<Arc<dyn OcrAdapter>>,
        deadline: Option<Instant>,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (job_sender, job_receiver) = bounded::<Job>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<JobResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_ocr = ocr.clone();

            let handle = thread::spawn(move || {
                run_worker(
                    worker_id,
                    job_rx,
                    result_tx,
                    shutdown_flag,
                    confidence_threshold,
                    worker_ocr,
                    deadline,
                );
            });

            workers.push(handle);
        }

        info!("Started {} extraction workers", worker_count);

        Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
        }
    }

    pub fn submit(&self, job: Job) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    /// Blocks for the next result, but never past `timeout`. Returns `None`
    /// on timeout or when every worker has hung up, so a crashed worker can
    /// not stall the caller forever.
    pub fn recv_result_timeout(&self, timeout: std::time::Duration) -> Option<JobResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<Job>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    confidence_threshold: f32,
    ocr: Option<Arc<dyn OcrAdapter>>,
    deadline: Option<Instant>,
) {
    debug!("Worker {} started", worker_id);

    let engine = ExtractionEngine::new(confidence_threshold, ocr.as_deref(), deadline);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing document: {}", worker_id, job.document.name);

                let outcome = loader::load_document(&job.document.name, &job.document.bytes)
                    .map(|pages| {
                        engine.extract_document(&job.document.name, &job.document.bytes, pages)
                    });

                let result = JobResult::new(&job, outcome);
                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceDocument;
    use crate::testutil::build_pdf;

    #[test]
    fn test_worker_pool_creation() {
        let pool = WorkerPool::new(2, 0.55, None, None);

        assert!(!pool.is_shutdown());

        pool.shutdown();
        assert!(pool.is_shutdown());

        pool.wait();
    }

    #[test]
    fn test_submit_and_extract_document() {
        let pool = WorkerPool::new(2, 0.55, None, None);

        let page = "\
Course : MA101 - Mathematics I
Test Name : FT1
1 RA2111003010001 ALICE JOHNSON 50 42";
        let bytes = build_pdf(&[page]);
        pool.submit(Job::new(SourceDocument::new("ft1.pdf", bytes)))
            .unwrap();

        let result = pool
            .recv_result_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        assert_eq!(result.document, "ft1.pdf");
        let extraction = result.outcome.unwrap();
        assert_eq!(extraction.drafts.len(), 1);
        assert_eq!(
            extraction.drafts[0].student_id.as_deref(),
            Some("RA2111003010001")
        );

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_unreadable_document_comes_back_as_error() {
        let pool = WorkerPool::new(1, 0.55, None, None);

        pool.submit(Job::new(SourceDocument::new(
            "bad.pdf",
            b"not a pdf".to_vec(),
        )))
        .unwrap();

        let result = pool
            .recv_result_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        assert!(result.outcome.is_err());

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_recv_timeout_on_idle_pool_returns_none() {
        let pool = WorkerPool::new(1, 0.55, None, None);

        let result = pool.recv_result_timeout(std::time::Duration::from_millis(50));
        assert!(result.is_none());

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(1, 0.55, None, None);
        pool.shutdown();

        let err = pool.submit(Job::new(SourceDocument::new("a.pdf", vec![])));
        assert!(matches!(err, Err(WorkerError::ChannelClosed)));

        pool.wait();
    }
}
