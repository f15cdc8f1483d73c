pub mod archive;
pub mod book;
pub mod container;
pub mod error;
pub mod ncx;
pub mod opf;
pub mod reader;
pub(crate) mod xml;

// 重新导出错误处理
pub use error::{EpubError, Result};

// 重新导出容器归档与描述符
pub use archive::ContainerArchive;
pub use container::{Container, RootFile};

// 重新导出书籍模型
pub use book::{Book, BookBuilder, Manifest, PackageDocument, Spine};

// 重新导出EPUB读取器
pub use reader::EpubReader;

// 重新导出OPF与NCX解析器
pub use ncx::{NavPoint, NavigationDocument, NcxParser};
pub use opf::Opf;
