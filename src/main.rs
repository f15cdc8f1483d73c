use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use clap::Parser;
use once_cell::sync::Lazy;

use inkforge::pipeline::transform::{self, TextTransform};
use inkforge::{EpubError, EpubReader, PipelineConfig, RewritePipeline};

/// 📚 InkForge - EPUB文本批量改写工具
#[derive(Parser)]
#[command(name = "inkforge")]
#[command(about = "一个用于批量改写EPUB文本内容的Rust工具")]
#[command(version)]
struct Args {
    /// 要执行的命令名称
    #[arg(long, help = "要执行的命令名称")]
    command: String,

    /// EPUB文件路径
    #[arg(long, help = "要处理的EPUB文件路径")]
    src_path: Option<String>,

    /// 文本变换名称
    #[arg(long, default_value = "identity", help = "注册表中的文本变换名称")]
    transform: String,

    /// 调试模式
    #[arg(long, help = "失败时输出完整诊断信息")]
    debug: bool,
}

/// 命令执行失败的边界包装
#[derive(Debug)]
struct ExecuteError {
    message: String,
    source: Option<EpubError>,
}

impl ExecuteError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    fn wrap(message: impl Into<String>, source: EpubError) -> Self {
        Self {
            message: message.into(),
            source: Some(source),
        }
    }
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => write!(f, "{}", self.message),
        }
    }
}

/// 可执行的命令，按种类封闭枚举，通过显式match分发
enum Command {
    /// 对EPUB执行批量文本改写
    RewriteText(RewriteTextCommand),
}

impl Command {
    fn execute(self) -> Result<(), ExecuteError> {
        match self {
            Command::RewriteText(command) => command.execute(),
        }
    }
}

/// 命令构造函数
type CommandConstructor = fn(&Args) -> Result<Command, ExecuteError>;

/// 命令名称到构造函数的注册表，新增命令在此登记
static COMMANDS: Lazy<HashMap<&'static str, CommandConstructor>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, CommandConstructor> = HashMap::new();
    map.insert("rewriteText", RewriteTextCommand::from_args);
    map
});

/// 批量文本改写命令
struct RewriteTextCommand {
    src_path: String,
    transform: Arc<dyn TextTransform>,
}

impl RewriteTextCommand {
    fn from_args(args: &Args) -> Result<Command, ExecuteError> {
        let src_path = args
            .src_path
            .clone()
            .ok_or_else(|| ExecuteError::new("缺少必需的选项: --src-path"))?;
        let transform = transform::create_transform(&args.transform).ok_or_else(|| {
            ExecuteError::new(format!(
                "未注册的文本变换: {} (可用: {})",
                args.transform,
                transform::transform_names().join(", ")
            ))
        })?;

        Ok(Command::RewriteText(RewriteTextCommand {
            src_path,
            transform,
        }))
    }

    fn execute(self) -> Result<(), ExecuteError> {
        let reader = EpubReader::new(&self.src_path)
            .map_err(|e| ExecuteError::wrap(format!("无法打开 {}", self.src_path), e))?;

        let book = reader.book();
        println!("📖 书名: {} (语言: {})", book.name, book.language);
        let eligible = book.manifest.values().filter(|m| m.is_xhtml()).count();
        println!("⚙️  改写 {} 个XHTML条目与导航文档...", eligible);

        let pipeline = RewritePipeline::with_config(PipelineConfig::new());
        let run_result = pipeline.run(&reader, self.transform);
        // 无论改写结果如何都落盘并释放归档，已完成的改写不回滚
        let close_result = reader.close();

        let report =
            run_result.map_err(|e| ExecuteError::wrap("批量改写未全部完成", e))?;
        close_result.map_err(|e| ExecuteError::wrap("写回EPUB失败", e))?;

        println!("✅ 完成 {} 个改写任务", report.tasks.len());
        Ok(())
    }
}

fn main() {
    let args = Args::parse();

    println!("📚 InkForge - EPUB文本改写工具");

    let Some(constructor) = COMMANDS.get(args.command.as_str()) else {
        eprintln!("❌ 未知命令: {}", args.command);
        let mut names: Vec<&&str> = COMMANDS.keys().collect();
        names.sort_unstable();
        eprintln!(
            "可用命令: {}",
            names
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        std::process::exit(2);
    };

    match constructor(&args).and_then(Command::execute) {
        Ok(_) => println!("🎉 EPUB文件处理完成！"),
        Err(e) => {
            if args.debug {
                eprintln!("❌ 错误: {:#?}", e);
            } else {
                eprintln!("❌ 错误: {}", e);
            }
            std::process::exit(1);
        }
    }
}
