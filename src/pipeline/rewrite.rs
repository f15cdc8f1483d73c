//! 批量改写管线模块
//!
//! 对书籍中符合条件的条目应用文本变换并写回归档：
//! XHTML清单条目的改写任务提交到有界工作线程池并发执行，
//! 导航文档在发起线程上同步改写。提交后以限时的显式join收集
//! 每个任务的结果，任何任务失败或未在期限内完成都会整体报错，
//! 而不会静默继续。

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Instant;

use crate::epub::archive::ContainerArchive;
use crate::epub::error::{EpubError, Result};
use crate::epub::reader::EpubReader;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::transform::TextTransform;
use crate::pipeline::{navdoc, xhtml};

/// 导航文档任务在报告中使用的任务标识
const NAVIGATION_TASK_ID: &str = "navigation";

/// 单个改写任务的结局
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// 改写并写回成功
    Completed,
    /// 读取、改写或写回失败
    Failed(String),
    /// 期限内未收到结果
    TimedOut,
}

/// 单个改写任务的结果
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// 清单项ID，导航文档任务为`navigation`
    pub id: String,
    /// 归档内的条目路径
    pub entry_path: String,
    /// 任务结局
    pub status: TaskStatus,
}

/// 一次批量改写的汇总报告，每个任务一条结果
#[derive(Debug, Default)]
pub struct RewriteReport {
    pub tasks: Vec<TaskResult>,
}

impl RewriteReport {
    /// 是否全部任务都已成功完成
    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }

    /// 汇总未完成任务的描述，用于聚合错误消息
    fn failure_summary(&self) -> String {
        let failures: Vec<String> = self
            .tasks
            .iter()
            .filter_map(|t| match &t.status {
                TaskStatus::Completed => None,
                TaskStatus::Failed(reason) => Some(format!("{}(失败: {})", t.entry_path, reason)),
                TaskStatus::TimedOut => Some(format!("{}(超时)", t.entry_path)),
            })
            .collect();
        format!(
            "{}/{}个任务未完成: {}",
            failures.len(),
            self.tasks.len(),
            failures.join(", ")
        )
    }
}

/// 批量改写管线
pub struct RewritePipeline {
    config: PipelineConfig,
}

impl RewritePipeline {
    /// 使用默认调度配置创建管线
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// 使用指定调度配置创建管线
    pub fn with_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// 对书籍执行批量改写
    ///
    /// 筛选规则：媒体类型为application/xhtml+xml的清单条目逐条改写
    /// 段落文本；导航文档总是被改写。条目路径两两不同，任务之间
    /// 没有次序约束。已写入覆盖层的结果不做回滚，由调用方决定
    /// 是否落盘。
    ///
    /// # 参数
    /// * `reader` - 已装配完成的EPUB读取器
    /// * `transform` - 文本变换能力
    ///
    /// # 返回值
    /// * `Result<RewriteReport>` - 全部任务成功时返回报告；任何任务
    ///   失败或超时返回`RewriteError`，消息中含每个未完成任务的结局
    pub fn run(
        &self,
        reader: &EpubReader,
        transform: Arc<dyn TextTransform>,
    ) -> Result<RewriteReport> {
        let book = reader.book();
        let archive = reader.archive_handle();

        // 任务枚举：符合媒体类型筛选的清单条目
        let eligible: Vec<(String, String)> = book
            .manifest
            .values()
            .filter(|m| m.is_xhtml())
            .map(|m| (m.id.clone(), reader.resolve_manifest_path(&m.file_path)))
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads)
            .build()
            .map_err(|e| EpubError::RewriteError(format!("创建工作线程池失败: {}", e)))?;

        let (sender, receiver) = mpsc::channel::<TaskResult>();
        for (id, entry_path) in &eligible {
            let sender = sender.clone();
            let archive = Arc::clone(&archive);
            let transform = Arc::clone(&transform);
            let id = id.clone();
            let entry_path = entry_path.clone();
            pool.spawn(move || {
                let status = match rewrite_manifest_entry(&archive, &entry_path, &*transform) {
                    Ok(()) => TaskStatus::Completed,
                    Err(e) => TaskStatus::Failed(e.to_string()),
                };
                // 接收端提前关闭时结果只能丢弃
                let _ = sender.send(TaskResult {
                    id,
                    entry_path,
                    status,
                });
            });
        }
        drop(sender);

        // 导航文档任务不进线程池，在发起线程同步执行
        let navigation_path = book.spine.navigation_file_path.clone();
        let navigation_status =
            match rewrite_navigation_entry(&archive, &navigation_path, &*transform) {
                Ok(()) => TaskStatus::Completed,
                Err(e) => TaskStatus::Failed(e.to_string()),
            };

        // 限时的显式join：超过期限的任务标记为超时
        let deadline = Instant::now() + self.config.wait_timeout();
        let mut report = RewriteReport::default();
        let mut received = 0usize;
        while received < eligible.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining) {
                Ok(result) => {
                    report.tasks.push(result);
                    received += 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        for (id, entry_path) in &eligible {
            if !report.tasks.iter().any(|t| &t.id == id) {
                report.tasks.push(TaskResult {
                    id: id.clone(),
                    entry_path: entry_path.clone(),
                    status: TaskStatus::TimedOut,
                });
            }
        }
        report.tasks.push(TaskResult {
            id: NAVIGATION_TASK_ID.to_string(),
            entry_path: navigation_path,
            status: navigation_status,
        });

        if report.is_success() {
            Ok(report)
        } else {
            Err(EpubError::RewriteError(report.failure_summary()))
        }
    }
}

impl Default for RewritePipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// 单个清单条目的改写任务：读取、改写段落、写回同一条目
fn rewrite_manifest_entry(
    archive: &ContainerArchive,
    entry_path: &str,
    transform: &dyn TextTransform,
) -> Result<()> {
    let content = archive.read_text(entry_path)?;
    let rewritten = xhtml::rewrite_paragraphs(&content, transform)?;
    archive.write_text(entry_path, &rewritten)
}

/// 导航文档的改写任务：读取、改写text元素、带缩进写回
fn rewrite_navigation_entry(
    archive: &ContainerArchive,
    entry_path: &str,
    transform: &dyn TextTransform,
) -> Result<()> {
    let content = archive.read_text(entry_path)?;
    let rewritten = navdoc::rewrite_text_elements(&content, transform)?;
    archive.write_text(entry_path, &rewritten)
}
