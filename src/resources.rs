// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态资源加载
//!
//! JS/CSS/图片/字体等非生成内容由 [`ResourceLoader`] 提供，响应工厂直接调用它。

use std::io;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use log::debug;

/// 静态资源的种类，决定 MIME 类型的选择方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    JavaScript,
    Css,
    Image,
    Font,
}

impl ResourceKind {
    /// 资源在根目录下所在的子目录，同时也是路由名。
    pub fn directory(&self) -> &'static str {
        match self {
            ResourceKind::JavaScript => "js",
            ResourceKind::Css => "css",
            ResourceKind::Image => "img",
            ResourceKind::Font => "fonts",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait ResourceLoader: Send + Sync {
    /// `name` 是相对于该种类目录的路径，例如 `player.js` 或 `vendor/chart.js`。
    fn load(&self, kind: ResourceKind, name: &str) -> io::Result<Bytes>;
}

/// 从 `www_root` 下读取文件。
pub struct FileResourceLoader {
    root: PathBuf,
}

impl FileResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceLoader for FileResourceLoader {
    fn load(&self, kind: ResourceKind, name: &str) -> io::Result<Bytes> {
        if !is_safe_relative(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("illegal resource path {}", name),
            ));
        }
        let path = self.root.join(kind.directory()).join(name);
        debug!("读取静态资源：{}", path.display());
        Ok(Bytes::from(std::fs::read(path)?))
    }
}

/// 只允许普通的相对路径段，拒绝 `..`、绝对路径与盘符前缀。
pub fn is_safe_relative(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('\\')
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_is_safe_relative() {
        assert!(is_safe_relative("player.js"));
        assert!(is_safe_relative("vendor/chart.js"));
        assert!(!is_safe_relative("../secret.txt"));
        assert!(!is_safe_relative("vendor/../../etc/passwd"));
        assert!(!is_safe_relative("/etc/passwd"));
        assert!(!is_safe_relative("..\\windows"));
        assert!(!is_safe_relative(""));
    }

    #[test]
    fn test_load_existing_resource() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/style.css"), "body{}").unwrap();

        let loader = FileResourceLoader::new(dir.path());
        let bytes = loader.load(ResourceKind::Css, "style.css").unwrap();

        assert_eq!(bytes, Bytes::from("body{}"));
    }

    #[test]
    fn test_load_missing_resource() {
        let dir = tempdir().unwrap();
        let loader = FileResourceLoader::new(dir.path());
        let err = loader.load(ResourceKind::JavaScript, "nope.js").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_traversal_rejected() {
        let dir = tempdir().unwrap();
        let loader = FileResourceLoader::new(dir.path());
        let err = loader.load(ResourceKind::Font, "../../Cargo.toml").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
