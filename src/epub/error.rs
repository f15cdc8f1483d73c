use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EpubError>;

/// Epub相关的错误类型
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// 容器初始化失败。携带的原因字符串是稳定的，脚本调用方可以据此分支
    #[error("EPUB初始化失败: {0}")]
    InitError(String),

    #[error("条目不存在: {0}")]
    EntryNotFound(String),

    #[error("读取条目失败: {0}")]
    ReadError(String),

    #[error("写入条目失败: {0}")]
    WriteError(String),

    #[error("XML解析错误: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("container.xml解析错误: {0}")]
    ContainerParseError(String),

    #[error("OPF文件解析错误: {0}")]
    OpfParseError(String),

    #[error("NCX文件解析错误: {0}")]
    NcxParseError(String),

    #[error("批量改写失败: {0}")]
    RewriteError(String),

    #[error("配置文件错误: {0}")]
    ConfigError(String),
}
