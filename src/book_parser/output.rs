//! 产物写盘。
//!
//! 命名规则：`<序号前缀?><清洗后的标题>.<扩展名>`；标题清洗后撞名时追加
//! 章节 ID 区分。文件句柄按作用域获取，成功路径显式 flush，错误路径随
//! RAII 关闭，不留悬空句柄。

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::base_system::context::safe_fs_name;
use crate::download::error::DownloadError;
use crate::download::models::{ArtifactData, RenderedArtifact};

pub(crate) struct OutputWriter {
    dest: PathBuf,
    ordered: bool,
    width: usize,
    used: HashSet<String>,
}

impl OutputWriter {
    pub(crate) fn new(
        dest: &Path,
        ordered: bool,
        width: usize,
    ) -> Result<Self, DownloadError> {
        std::fs::create_dir_all(dest).map_err(|source| DownloadError::Write {
            path: dest.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dest: dest.to_path_buf(),
            ordered,
            width,
            used: HashSet::new(),
        })
    }

    /// 写出一个产物，返回最终路径。
    pub(crate) fn write(&mut self, artifact: RenderedArtifact) -> Result<PathBuf, DownloadError> {
        let path = self.target_path(&artifact);
        debug!(target: "render", path = %path.display(), "写出产物");

        match artifact.data {
            ArtifactData::Bytes(bytes) => {
                let write_err = |source: std::io::Error| DownloadError::Write {
                    path: path.clone(),
                    source,
                };
                let file = File::create(&path).map_err(write_err)?;
                let mut writer = BufWriter::new(file);
                writer.write_all(&bytes).map_err(write_err)?;
                writer.flush().map_err(write_err)?;
            }
            ArtifactData::Staged(staged) => {
                staged.persist(&path).map_err(|e| DownloadError::Write {
                    path: path.clone(),
                    source: e.error,
                })?;
            }
        }

        info!(target: "render", "已保存: {}", path.display());
        Ok(path)
    }

    /// 确定性命名 + 撞名消歧。
    fn target_path(&mut self, artifact: &RenderedArtifact) -> PathBuf {
        let prefix = if self.ordered {
            format!("{:0width$}.", artifact.ordinal, width = self.width)
        } else {
            String::new()
        };
        let base = format!("{}{}", prefix, safe_fs_name(&artifact.title, "_", 120));

        let stem = if self.used.contains(&base) {
            format!("{}_{}", base, artifact.chapter_id)
        } else {
            base
        };
        self.used.insert(stem.clone());

        self.dest.join(format!("{}.{}", stem, artifact.ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(id: &str, title: &str, ordinal: usize, body: &str) -> RenderedArtifact {
        RenderedArtifact {
            chapter_id: id.to_string(),
            title: title.to_string(),
            ordinal,
            ext: "md",
            mime: "text/markdown",
            data: ArtifactData::Bytes(body.as_bytes().to_vec()),
        }
    }

    #[test]
    fn writes_bytes_to_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = OutputWriter::new(dir.path(), false, 3).unwrap();
        let path = writer.write(artifact("1", "开篇", 1, "# 开篇")).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# 开篇");
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "开篇.md");
    }

    #[test]
    fn ordered_prefixes_increase_with_ordinal() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = OutputWriter::new(dir.path(), true, 3).unwrap();
        let mut names = Vec::new();
        for (i, title) in ["甲", "乙", "丙"].iter().enumerate() {
            let path = writer
                .write(artifact(&i.to_string(), title, i + 1, "x"))
                .unwrap();
            names.push(path.file_name().unwrap().to_str().unwrap().to_string());
        }
        assert_eq!(names, vec!["001.甲.md", "002.乙.md", "003.丙.md"]);
        let prefixes: Vec<u32> = names
            .iter()
            .map(|n| n.split('.').next().unwrap().parse().unwrap())
            .collect();
        assert!(prefixes.windows(2).all(|w| w[0] < w[1]), "前缀严格递增");
    }

    #[test]
    fn duplicate_titles_get_chapter_id_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = OutputWriter::new(dir.path(), false, 3).unwrap();
        let first = writer.write(artifact("a1", "导论", 1, "1")).unwrap();
        let second = writer.write(artifact("a2", "导论", 2, "2")).unwrap();
        assert_eq!(first.file_name().unwrap().to_str().unwrap(), "导论.md");
        assert_eq!(second.file_name().unwrap().to_str().unwrap(), "导论_a2.md");
        assert_eq!(std::fs::read_to_string(second).unwrap(), "2");
    }

    #[test]
    fn staged_file_is_persisted_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut staged = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        staged.write_all(b"audio-bytes").unwrap();
        let mut writer = OutputWriter::new(dir.path(), false, 3).unwrap();
        let path = writer
            .write(RenderedArtifact {
                chapter_id: "c".into(),
                title: "第1讲".into(),
                ordinal: 1,
                ext: "mp3",
                mime: "audio/mpeg",
                data: ArtifactData::Staged(staged),
            })
            .unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"audio-bytes");
    }
}
