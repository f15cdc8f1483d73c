//! 容器归档模块
//!
//! 将zip格式的EPUB容器作为按路径寻址的虚拟文件系统打开，
//! 打开时校验两个必需条目（mimetype与META-INF/container.xml）。
//! 写入先记录在内存覆盖层中，flush/close时一次性落盘。

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::epub::error::{EpubError, Result};

/// EPUB容器要求mimetype文件包含的签名
const EPUB_MIMETYPE: &str = "application/epub+zip";

/// 已打开的EPUB容器归档
///
/// 所有方法都以`&self`访问：zip句柄和写覆盖层各自位于互斥锁之后，
/// 因此一个`Arc<ContainerArchive>`可以安全地在多个工作线程之间共享。
/// 对不同条目的并发写入在覆盖层锁上串行化。
pub struct ContainerArchive {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
    /// 待落盘的条目内容，键为归一化后的条目路径
    pending: Mutex<HashMap<String, Vec<u8>>>,
}

impl ContainerArchive {
    /// 打开并校验一个EPUB容器
    ///
    /// 校验只在打开时进行一次：
    /// 1. `mimetype`条目必须存在且内容包含`application/epub+zip`
    /// 2. `META-INF/container.xml`条目必须存在
    ///
    /// 其余条目不做预先校验，之后的读取仍可能以`EntryNotFound`失败。
    ///
    /// # 参数
    /// * `path` - EPUB文件路径
    ///
    /// # 返回值
    /// * `Result<ContainerArchive>` - 校验失败返回携带稳定原因的`InitError`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ContainerArchive> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let archive = ZipArchive::new(file)?;

        let container = ContainerArchive {
            path,
            archive: Mutex::new(archive),
            pending: Mutex::new(HashMap::new()),
        };
        container.validate()?;

        Ok(container)
    }

    /// 校验容器的两个必需条目
    fn validate(&self) -> Result<()> {
        match self.read_text("mimetype") {
            Ok(content) => {
                if !content.contains(EPUB_MIMETYPE) {
                    return Err(EpubError::InitError("Invalid mimetype file".to_string()));
                }
            }
            Err(EpubError::EntryNotFound(_)) => {
                return Err(EpubError::InitError("mimetype file not found".to_string()));
            }
            Err(e) => return Err(EpubError::InitError(e.to_string())),
        }

        if !self.exists("META-INF/container.xml") {
            return Err(EpubError::InitError(
                "META-INF/container.xml file not found".to_string(),
            ));
        }

        Ok(())
    }

    /// 归一化条目路径：容器内条目名不带前导斜杠，
    /// 归档绝对路径（如`/OEBPS/toc.ncx`）去掉前导`/`后寻址同一条目
    fn normalize(entry: &str) -> &str {
        entry.trim_start_matches('/')
    }

    /// 检查指定条目是否存在（覆盖层中的新条目同样可见）
    pub fn exists(&self, entry: &str) -> bool {
        let name = Self::normalize(entry);
        if self.pending.lock().contains_key(name) {
            return true;
        }
        self.archive.lock().by_name(name).is_ok()
    }

    /// 读取指定条目的文本内容
    ///
    /// 读取会先查看写覆盖层，因此同一句柄上的写入对后续读取立即可见。
    ///
    /// # 参数
    /// * `entry` - 条目路径
    ///
    /// # 返回值
    /// * `Result<String>` - 条目缺失返回`EntryNotFound`，读取或解码失败返回`ReadError`
    pub fn read_text(&self, entry: &str) -> Result<String> {
        let name = Self::normalize(entry);

        if let Some(bytes) = self.pending.lock().get(name) {
            return String::from_utf8(bytes.clone())
                .map_err(|e| EpubError::ReadError(format!("{}: {}", name, e)));
        }

        let mut archive = self.archive.lock();
        let mut file = match archive.by_name(name) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(EpubError::EntryNotFound(name.to_string()));
            }
            Err(e) => return Err(EpubError::ReadError(format!("{}: {}", name, e))),
        };

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| EpubError::ReadError(format!("{}: {}", name, e)))?;
        Ok(content)
    }

    /// 读取指定条目的二进制内容
    ///
    /// # 参数
    /// * `entry` - 条目路径
    ///
    /// # 返回值
    /// * `Result<Vec<u8>>` - 条目的二进制内容
    pub fn read_binary(&self, entry: &str) -> Result<Vec<u8>> {
        let name = Self::normalize(entry);

        if let Some(bytes) = self.pending.lock().get(name) {
            return Ok(bytes.clone());
        }

        let mut archive = self.archive.lock();
        let mut file = match archive.by_name(name) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(EpubError::EntryNotFound(name.to_string()));
            }
            Err(e) => return Err(EpubError::ReadError(format!("{}: {}", name, e))),
        };

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .map_err(|e| EpubError::ReadError(format!("{}: {}", name, e)))?;
        Ok(buffer)
    }

    /// 以UTF-8文本覆盖指定条目
    ///
    /// 写入只记录在覆盖层中，调用`flush`或`close`后才会落盘。
    /// 不同条目不会被多个任务写入，同一条目的后写覆盖先写。
    pub fn write_text(&self, entry: &str, content: &str) -> Result<()> {
        let name = Self::normalize(entry);
        self.pending
            .lock()
            .insert(name.to_string(), content.as_bytes().to_vec());
        Ok(())
    }

    /// 将覆盖层落盘
    ///
    /// 未改动的条目原样拷贝，改动过的条目以新内容替换，结果写入
    /// 同目录下的临时文件后原子地重命名回源文件。失败时源文件保持不变，
    /// 覆盖层也保持不变，可以重试。
    pub fn flush(&self) -> Result<()> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return Ok(());
        }
        let mut archive = self.archive.lock();

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "archive".to_string());
        let tmp_path = self.path.with_file_name(format!("{}.tmp", file_name));

        let tmp_file = File::create(&tmp_path)
            .map_err(|e| EpubError::WriteError(format!("{}: {}", tmp_path.display(), e)))?;
        let mut writer = ZipWriter::new(tmp_file);
        let mut seen = HashSet::new();

        let write_err =
            |name: &str, e: &dyn std::fmt::Display| EpubError::WriteError(format!("{}: {}", name, e));

        for i in 0..archive.len() {
            let entry = archive
                .by_index(i)
                .map_err(|e| write_err("<index>", &e))?;
            let name = entry.name().to_string();
            seen.insert(name.clone());

            if let Some(content) = pending.get(&name) {
                // mimetype按约定保持首条目且不压缩
                let method = if name == "mimetype" {
                    CompressionMethod::Stored
                } else {
                    CompressionMethod::Deflated
                };
                drop(entry);
                writer
                    .start_file(
                        name.as_str(),
                        SimpleFileOptions::default().compression_method(method),
                    )
                    .map_err(|e| write_err(&name, &e))?;
                writer
                    .write_all(content)
                    .map_err(|e| write_err(&name, &e))?;
            } else {
                writer
                    .raw_copy_file(entry)
                    .map_err(|e| write_err(&name, &e))?;
            }
        }

        // 覆盖层中新建的条目
        for (name, content) in pending.iter() {
            if seen.contains(name) {
                continue;
            }
            writer
                .start_file(name.as_str(), SimpleFileOptions::default())
                .map_err(|e| write_err(name, &e))?;
            writer
                .write_all(content)
                .map_err(|e| write_err(name, &e))?;
        }

        writer
            .finish()
            .map_err(|e| write_err("<finish>", &e))?;

        fs::rename(&tmp_path, &self.path)
            .map_err(|e| EpubError::WriteError(format!("{}: {}", self.path.display(), e)))?;

        // 重新打开归档，使句柄与落盘后的内容一致
        let file = File::open(&self.path)
            .map_err(|e| EpubError::WriteError(format!("{}: {}", self.path.display(), e)))?;
        *archive = ZipArchive::new(file)
            .map_err(|e| EpubError::WriteError(format!("{}: {}", self.path.display(), e)))?;

        pending.clear();
        Ok(())
    }

    /// 落盘并释放归档句柄
    pub fn close(self) -> Result<()> {
        self.flush()
    }
}

impl Drop for ContainerArchive {
    fn drop(&mut self) {
        // 尽力而为的落盘，保证acquire/release模式在所有退出路径上成立
        let dirty = !self.pending.lock().is_empty();
        if dirty {
            let _ = self.flush();
        }
    }
}
