//! 上传进度
//!
//! 单文件上传按顺序上报：`WaitingToStart` -> `Starting` -> 若干`Transferring` ->
//! `Succeeded`或`Failed`（二者只会出现一个）。

use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    WaitingToStart,
    Starting,
    Transferring,
    Succeeded,
    Failed,
}

/// 一次上传（或大文件中的一个part）的进度
///
/// 小文件的`part_index`为0、`part_count`为1。把part的进度换算为整个文件的进度由listener自己决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub part_index: u32,
    pub part_count: u32,
    pub start_byte: u64,
    pub length: u64,
    pub bytes_so_far: u64,
    pub state: UploadState,
}

impl UploadProgress {
    pub fn for_small_file(length: u64, bytes_so_far: u64, state: UploadState) -> Self {
        Self {
            part_index: 0,
            part_count: 1,
            start_byte: 0,
            length,
            bytes_so_far,
            state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, UploadState::Succeeded | UploadState::Failed)
    }
}

pub trait UploadListener: Send + Sync {
    fn progress(&self, progress: &UploadProgress);
}

impl<F> UploadListener for F
where
    F: Fn(&UploadProgress) + Send + Sync,
{
    fn progress(&self, progress: &UploadProgress) {
        self(progress)
    }
}

/// 一次上传在整体中的位置，webifier根据它生成各个阶段的[`UploadProgress`]
#[derive(Debug, Clone, Copy)]
pub(crate) struct PartContext {
    pub part_index: u32,
    pub part_count: u32,
    pub start_byte: u64,
    pub length: u64,
}

impl PartContext {
    pub(crate) fn small_file(length: u64) -> Self {
        Self {
            part_index: 0,
            part_count: 1,
            start_byte: 0,
            length,
        }
    }

    pub(crate) fn progress(&self, bytes_so_far: u64, state: UploadState) -> UploadProgress {
        UploadProgress {
            part_index: self.part_index,
            part_count: self.part_count,
            start_byte: self.start_byte,
            length: self.length,
            bytes_so_far,
            state,
        }
    }
}

/// 字节级进度：把已读字节数换成`Transferring`事件，并做限流
///
/// 字节数总是精确记录，事件最多每`interval`发一次（第一次读取总会上报）。
pub(crate) struct ByteProgressFilter {
    listener: Option<Arc<dyn UploadListener>>,
    context: PartContext,
    bytes_so_far: AtomicU64,
    interval: Duration,
    last_reported: Mutex<Option<Instant>>,
}

impl ByteProgressFilter {
    pub(crate) const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub(crate) fn new(
        listener: Option<Arc<dyn UploadListener>>,
        context: PartContext,
        interval: Duration,
    ) -> Self {
        Self {
            listener,
            context,
            bytes_so_far: AtomicU64::new(0),
            interval,
            last_reported: Mutex::new(None),
        }
    }

    pub(crate) fn bytes_so_far(&self) -> u64 {
        self.bytes_so_far.load(Ordering::SeqCst)
    }

    fn on_bytes(&self, n: u64) {
        let total = self.bytes_so_far.fetch_add(n, Ordering::SeqCst) + n;
        let Some(listener) = &self.listener else {
            return;
        };

        let now = Instant::now();
        let should_report = {
            let mut last = self
                .last_reported
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let due = last.is_none_or(|t| now.duration_since(t) >= self.interval);
            if due {
                *last = Some(now);
            }
            due
        };
        if should_report {
            listener.progress(&self.context.progress(total, UploadState::Transferring));
        }
    }

    /// 向listener发送阶段事件（非`Transferring`）
    pub(crate) fn report(&self, state: UploadState, bytes_so_far: u64) {
        if let Some(listener) = &self.listener {
            listener.progress(&self.context.progress(bytes_so_far, state));
        }
    }
}

/// 每次read后把读取的字节数交给[`ByteProgressFilter`]
pub(crate) struct ProgressReader<R> {
    inner: R,
    filter: Arc<ByteProgressFilter>,
}

impl<R: Read> ProgressReader<R> {
    pub(crate) fn new(inner: R, filter: Arc<ByteProgressFilter>) -> Self {
        Self { inner, filter }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.filter.on_bytes(n as u64);
        }
        Ok(n)
    }
}
