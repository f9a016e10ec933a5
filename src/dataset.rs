//! On-disk gesture dataset: one folder per class, one JPEG per sample.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::info;

use crate::error::Result;
use crate::messages::camera_frame::CameraFrame;

/// JPEG quality of saved training samples.
pub const SAMPLE_JPEG_QUALITY: u8 = 95;

/// The hand poses the model knows, in model output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GestureClass {
    Middle,
    Peace,
    Woensel,
}

impl GestureClass {
    pub const ALL: [GestureClass; 3] = [GestureClass::Middle, GestureClass::Peace, GestureClass::Woensel];

    pub fn name(self) -> &'static str {
        match self {
            GestureClass::Middle => "middle",
            GestureClass::Peace => "peace",
            GestureClass::Woensel => "woensel",
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for GestureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GestureClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|class| class.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown gesture class '{s}'"))
    }
}

/// Number of samples per class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassCounters {
    counts: BTreeMap<GestureClass, usize>,
}

impl ClassCounters {
    pub fn zeroed() -> Self {
        Self { counts: GestureClass::ALL.into_iter().map(|c| (c, 0)).collect() }
    }

    /// Counts the entries already present in each class folder under `root`.
    pub fn from_dir(root: &Path) -> Result<Self> {
        let mut counters = Self::zeroed();
        for class in GestureClass::ALL {
            let dir = root.join(class.name());
            let count = match fs::read_dir(&dir) {
                Ok(entries) => entries.count(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
                Err(e) => return Err(e.into()),
            };
            counters.counts.insert(class, count);
        }
        Ok(counters)
    }

    pub fn get(&self, class: GestureClass) -> usize {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, class: GestureClass) -> usize {
        let count = self.counts.entry(class).or_insert(0);
        *count += 1;
        *count
    }

    pub fn snapshot(&self) -> BTreeMap<GestureClass, usize> {
        self.counts.clone()
    }
}

/// Saves labelled frames below `root/<class>/` and keeps the counters in step.
#[derive(Debug)]
pub struct DatasetWriter {
    root: PathBuf,
    counters: ClassCounters,
}

impl DatasetWriter {
    /// Creates the class folders and counts what is already there.
    pub fn prepare(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for class in GestureClass::ALL {
            fs::create_dir_all(root.join(class.name()))?;
        }
        let counters = ClassCounters::from_dir(&root)?;
        Ok(Self { root, counters })
    }

    pub fn counters(&self) -> &ClassCounters {
        &self.counters
    }

    pub fn save(&mut self, class: GestureClass, frame: &CameraFrame) -> Result<PathBuf> {
        let jpeg = frame.to_jpeg(SAMPLE_JPEG_QUALITY)?;

        let stem = format!("img_{}", frame.captured_at().format("%Y%m%d_%H%M%S_%6f"));
        let (path, mut file) = create_unique(&self.root.join(class.name()), &stem)?;
        file.write_all(&jpeg)?;
        file.sync_all()?;

        let count = self.counters.increment(class);
        info!("Saved {} #{}: {}", class, count, path.display());
        Ok(path)
    }

    pub fn log_summary(&self) {
        info!("=== CAPTURE SUMMARY ===");
        for (class, count) in self.counters.snapshot() {
            info!("{}: {} images", class, count);
        }
        info!("Images saved to: {}/", self.root.display());
    }
}

/// Opens `<stem>.jpg`, or `<stem>_N.jpg` when that name is taken.
fn create_unique(dir: &Path, stem: &str) -> io::Result<(PathBuf, File)> {
    let mut attempt = 0u32;
    loop {
        let name = match attempt {
            0 => format!("{stem}.jpg"),
            n => format!("{stem}_{n}.jpg"),
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn jpeg_count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn class_order_matches_model_output() {
        assert_eq!(GestureClass::from_index(0), Some(GestureClass::Middle));
        assert_eq!(GestureClass::from_index(1), Some(GestureClass::Peace));
        assert_eq!(GestureClass::from_index(2), Some(GestureClass::Woensel));
        assert_eq!(GestureClass::from_index(3), None);
        assert_eq!("Peace".parse::<GestureClass>(), Ok(GestureClass::Peace));
        assert!("thumbs".parse::<GestureClass>().is_err());
    }

    #[test]
    fn counters_start_from_existing_files() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("middle")).unwrap();
        fs::write(tmp.path().join("middle/a.jpg"), b"x").unwrap();
        fs::write(tmp.path().join("middle/b.jpg"), b"x").unwrap();

        let counters = ClassCounters::from_dir(tmp.path()).unwrap();
        assert_eq!(counters.get(GestureClass::Middle), 2);
        assert_eq!(counters.get(GestureClass::Peace), 0);
        assert_eq!(counters.get(GestureClass::Woensel), 0);
    }

    #[test]
    fn prepare_creates_every_class_folder() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("jetson_dataset");
        let writer = DatasetWriter::prepare(&root).unwrap();

        for class in GestureClass::ALL {
            assert!(root.join(class.name()).is_dir());
        }
        assert_eq!(writer.counters(), &ClassCounters::zeroed());
    }

    #[test]
    fn saving_peace_bumps_only_peace() {
        let tmp = tempdir().unwrap();
        let mut writer = DatasetWriter::prepare(tmp.path()).unwrap();
        let frame = CameraFrame::filled(32, 24, 128);

        let path = writer.save(GestureClass::Peace, &frame).unwrap();

        let expected: BTreeMap<_, _> = [
            (GestureClass::Middle, 0),
            (GestureClass::Peace, 1),
            (GestureClass::Woensel, 0),
        ]
        .into_iter()
        .collect();
        assert_eq!(writer.counters().snapshot(), expected);
        assert_eq!(jpeg_count(&tmp.path().join("peace")), 1);
        assert_eq!(jpeg_count(&tmp.path().join("middle")), 0);
        assert_eq!(path.parent().unwrap(), tmp.path().join("peace"));
    }

    #[test]
    fn saved_sample_is_a_readable_jpeg() {
        let tmp = tempdir().unwrap();
        let mut writer = DatasetWriter::prepare(tmp.path()).unwrap();
        let path = writer.save(GestureClass::Woensel, &CameraFrame::filled(40, 30, 200)).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        // img_YYYYMMDD_HHMMSS_ffffff.jpg
        assert!(name.starts_with("img_"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), "img_20240101_120000_000000.jpg".len());

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn same_name_gets_a_suffix() {
        let tmp = tempdir().unwrap();
        let (first, _) = create_unique(tmp.path(), "img_x").unwrap();
        let (second, _) = create_unique(tmp.path(), "img_x").unwrap();

        assert_eq!(first.file_name().unwrap(), "img_x.jpg");
        assert_eq!(second.file_name().unwrap(), "img_x_1.jpg");
    }
}
