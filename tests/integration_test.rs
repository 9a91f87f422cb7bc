//! 整合測試 - 以記憶體內的影片寫入端驗證整個批次流程
//!
//! 不需要 ffmpeg；寫入端記錄每張影格的第一個像素，
//! 結束時才寫出輸出檔案。

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use auto_frame_video::component::frame_video_generator::{
    BatchDriver, BatchObserver, BatchSummary, Codec, CodecCandidate, CodecNegotiator,
    DEFAULT_CODEC_PRIORITY, EncodeError, FrameEnhancer, FrameProgress, FrameWriter, JobOutcome,
    OpenRequest, STAGING_DIR_NAME, SequenceEncoder, SilentObserver, VideoBackend,
};
use auto_frame_video::tools::JobLog;
use image::{Rgb, RgbImage};
use tempfile::TempDir;

#[derive(Debug, Clone)]
struct Recorded {
    output_path: PathBuf,
    codec: Codec,
    first_pixels: Vec<u8>,
}

#[derive(Default)]
struct Recorder {
    attempts: Vec<(PathBuf, Codec)>,
    videos: Vec<Recorded>,
}

struct MemoryWriter {
    recorder: Rc<RefCell<Recorder>>,
    current: Recorded,
}

impl FrameWriter for MemoryWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), EncodeError> {
        self.current.first_pixels.push(frame.get_pixel(0, 0).0[0]);
        Ok(())
    }

    fn finish(self) -> Result<u64, EncodeError> {
        fs::write(&self.current.output_path, &self.current.first_pixels)
            .map_err(EncodeError::Spawn)?;
        let count = self.current.first_pixels.len() as u64;
        self.recorder.borrow_mut().videos.push(self.current);
        Ok(count)
    }
}

struct MemoryBackend {
    accepts: Vec<Codec>,
    recorder: Rc<RefCell<Recorder>>,
}

impl MemoryBackend {
    fn accepting(accepts: &[Codec]) -> Self {
        Self {
            accepts: accepts.to_vec(),
            recorder: Rc::new(RefCell::new(Recorder::default())),
        }
    }
}

impl VideoBackend for MemoryBackend {
    type Writer = MemoryWriter;

    fn open(
        &mut self,
        candidate: CodecCandidate,
        request: &OpenRequest<'_>,
    ) -> Result<MemoryWriter, EncodeError> {
        self.recorder
            .borrow_mut()
            .attempts
            .push((request.output_path.to_path_buf(), candidate.codec));

        if !self.accepts.contains(&candidate.codec) {
            return Err(EncodeError::Rejected(format!("Unknown encoder '{}'", candidate.codec.encoder())));
        }

        Ok(MemoryWriter {
            recorder: Rc::clone(&self.recorder),
            current: Recorded {
                output_path: request.output_path.to_path_buf(),
                codec: candidate.codec,
                first_pixels: Vec::new(),
            },
        })
    }
}

fn write_frame(path: &Path, value: u8) {
    RgbImage::from_pixel(8, 6, Rgb([value, value, value]))
        .save(path)
        .unwrap();
}

fn run_batch(
    root: &Path,
    log_path: &Path,
    backend: MemoryBackend,
    enhancer: Option<FrameEnhancer>,
    observer: &mut dyn BatchObserver,
) -> BatchSummary {
    let encoder = SequenceEncoder::new(CodecNegotiator::default(), enhancer, 30);
    let mut driver = BatchDriver::new(
        encoder,
        backend,
        JobLog::open(log_path).unwrap(),
        Arc::new(AtomicBool::new(false)),
    );
    driver.run(root, observer).unwrap()
}

fn assert_no_staging(root: &Path) {
    let leftovers: Vec<_> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_name() == STAGING_DIR_NAME)
        .collect();
    assert!(leftovers.is_empty(), "暫存資料夾不應殘留: {leftovers:?}");
}

/// 測試 1: root/A 兩張 png、root/B/C 一張 jpg，只有 A 與 C 會被編碼
#[test]
fn test_leaf_directories_become_videos() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    fs::create_dir_all(root.join("A")).unwrap();
    fs::create_dir_all(root.join("B/C")).unwrap();
    write_frame(&root.join("A/img1.png"), 10);
    write_frame(&root.join("A/img2.png"), 20);
    write_frame(&root.join("B/C/img1.jpg"), 30);
    let log_path = temp_dir.path().join("frame_video.log");

    let backend = MemoryBackend::accepting(&[Codec::H264]);
    let recorder = Rc::clone(&backend.recorder);
    let summary = run_batch(&root, &log_path, backend, None, &mut SilentObserver);

    assert_eq!(summary.leaf_count(), 2);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 0);

    let videos = recorder.borrow().videos.clone();
    let outputs: Vec<_> = videos.iter().map(|v| v.output_path.clone()).collect();
    assert_eq!(outputs, vec![root.join("A/A.mp4"), root.join("B/C/C.mp4")]);
    assert_eq!(videos[0].first_pixels.len(), 2);
    assert_eq!(videos[1].first_pixels.len(), 1);
    assert!(videos.iter().all(|v| v.codec == Codec::H264));

    assert!(root.join("A/A.mp4").exists());
    assert!(root.join("B/C/C.mp4").exists());
    assert!(!root.join("B/B.mp4").exists());
    assert_no_staging(&root);

    let log = fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.matches(" - INFO - 成功處理").count(), 2);

    println!("✓ 葉資料夾編碼測試通過");
}

/// 測試 2: 影格依原始檔名排序寫入
#[test]
fn test_frames_written_in_filename_order() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("seq");
    fs::create_dir_all(&root).unwrap();
    // 建立順序與檔名順序不同
    write_frame(&root.join("frame_c.png"), 3);
    write_frame(&root.join("frame_a.png"), 1);
    write_frame(&root.join("frame_b.bmp"), 2);
    fs::write(root.join("notes.txt"), "ignored").unwrap();

    let backend = MemoryBackend::accepting(&[Codec::H264]);
    let recorder = Rc::clone(&backend.recorder);
    let summary = run_batch(
        &root,
        &temp_dir.path().join("log"),
        backend,
        None,
        &mut SilentObserver,
    );

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(recorder.borrow().videos[0].first_pixels, vec![1, 2, 3]);
    assert_no_staging(&root);
}

/// 測試 3: 只有第三個候選可用時，依序嘗試前三個且不嘗試第四個
#[test]
fn test_codec_fallback_order() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("clip");
    fs::create_dir_all(&root).unwrap();
    write_frame(&root.join("0001.png"), 50);

    let third = DEFAULT_CODEC_PRIORITY[2].codec;
    let backend = MemoryBackend::accepting(&[third]);
    let recorder = Rc::clone(&backend.recorder);
    let summary = run_batch(
        &root,
        &temp_dir.path().join("log"),
        backend,
        None,
        &mut SilentObserver,
    );

    assert_eq!(summary.succeeded(), 1);
    let attempted: Vec<Codec> = recorder.borrow().attempts.iter().map(|(_, c)| *c).collect();
    let expected: Vec<Codec> = DEFAULT_CODEC_PRIORITY[..3].iter().map(|c| c.codec).collect();
    assert_eq!(attempted, expected);
    assert_eq!(summary.outcomes[0].job.codec.map(|c| c.codec), Some(third));
}

/// 測試 4: 沒有可用編碼器只讓該工作失敗
#[test]
fn test_no_codec_fails_every_job_but_batch_completes() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    for name in ["one", "two"] {
        fs::create_dir_all(root.join(name)).unwrap();
        write_frame(&root.join(name).join("a.png"), 1);
    }
    let log_path = temp_dir.path().join("log");

    let backend = MemoryBackend::accepting(&[]);
    let recorder = Rc::clone(&backend.recorder);
    let summary = run_batch(&root, &log_path, backend, None, &mut SilentObserver);

    assert_eq!(summary.failed(), 2);
    assert_eq!(
        recorder.borrow().attempts.len(),
        2 * DEFAULT_CODEC_PRIORITY.len()
    );
    for outcome in summary.failures() {
        assert_eq!(
            outcome.status.error().map(|e| e.kind()),
            Some("no_compatible_codec")
        );
    }
    assert_no_staging(&root);

    let log = fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.matches("處理失敗 [no_compatible_codec]").count(), 2);
}

/// 測試 5: 損壞的影格讓工作失敗、清掉暫存與不完整輸出，其他資料夾照常處理
#[test]
fn test_corrupt_frame_is_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    fs::create_dir_all(root.join("broken")).unwrap();
    fs::create_dir_all(root.join("fine")).unwrap();
    write_frame(&root.join("broken/001.png"), 1);
    fs::write(root.join("broken/002.png"), b"garbage").unwrap();
    write_frame(&root.join("fine/001.png"), 1);

    let summary = run_batch(
        &root,
        &temp_dir.path().join("log"),
        MemoryBackend::accepting(&[Codec::H264]),
        None,
        &mut SilentObserver,
    );

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    let failure = summary.failures().next().unwrap();
    assert_eq!(failure.job.leaf_dir, root.join("broken"));
    assert_eq!(failure.status.error().map(|e| e.kind()), Some("unreadable_frame"));
    assert!(!root.join("broken/broken.mp4").exists());
    assert!(root.join("fine/fine.mp4").exists());
    assert_no_staging(&root);
}

#[derive(Default)]
struct CollectingObserver {
    started: Vec<(usize, usize)>,
    progress: Vec<usize>,
    finished: usize,
}

impl BatchObserver for CollectingObserver {
    fn job_started(&mut self, index: usize, total: usize, _leaf_dir: &Path) {
        self.started.push((index, total));
    }

    fn frame_progress(&mut self, progress: &FrameProgress) {
        self.progress.push(progress.index);
    }

    fn job_finished(&mut self, _outcome: &JobOutcome) {
        self.finished += 1;
    }
}

/// 測試 6: 進度每 10 張與最後一張回報，強化不改變影格數
#[test]
fn test_progress_reporting_with_enhancement() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("long");
    fs::create_dir_all(&root).unwrap();
    for i in 0..23u8 {
        write_frame(&root.join(format!("f{i:03}.png")), i * 10);
    }

    let backend = MemoryBackend::accepting(&[Codec::Mpeg4]);
    let recorder = Rc::clone(&backend.recorder);
    let mut observer = CollectingObserver::default();
    let summary = run_batch(
        &root,
        &temp_dir.path().join("log"),
        backend,
        Some(FrameEnhancer::default()),
        &mut observer,
    );

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(observer.started, vec![(1, 1)]);
    assert_eq!(observer.progress, vec![10, 20, 23]);
    assert_eq!(observer.finished, 1);
    assert_eq!(recorder.borrow().videos[0].first_pixels.len(), 23);
    assert_eq!(summary.outcomes[0].job.frame_count, 23);
}

/// 測試 7: 重新執行會覆寫既有輸出
#[test]
fn test_rerun_overwrites_output() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("again");
    fs::create_dir_all(&root).unwrap();
    write_frame(&root.join("1.png"), 7);
    fs::write(root.join("again.mp4"), b"stale output").unwrap();

    for _ in 0..2 {
        let summary = run_batch(
            &root,
            &temp_dir.path().join("log"),
            MemoryBackend::accepting(&[Codec::H264]),
            None,
            &mut SilentObserver,
        );
        // 輸出檔本身是檔案，不影響葉資料夾判定
        assert_eq!(summary.succeeded(), 1);
    }

    assert_eq!(fs::read(root.join("again.mp4")).unwrap(), vec![7]);
    assert_no_staging(&root);
}
