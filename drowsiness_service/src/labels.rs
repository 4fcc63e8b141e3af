use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

/// Class names of the detection model, indexed by class id.
#[derive(Debug, Clone, Default)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl ClassLabels {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn from_file(filepath: &Path) -> io::Result<Self> {
        let file = File::open(filepath)?;
        Self::from_reader(io::BufReader::new(file))
    }

    /// One label per line. Blank lines are skipped; a line may carry extra
    /// comma separated columns (e.g. a display color) which are ignored.
    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut labels = Vec::new();

        for line_result in reader.lines() {
            let line = line_result?;
            let label = line.split(',').next().unwrap_or_default().trim();
            if label.is_empty() {
                continue;
            }
            labels.push(label.to_string());
        }

        if labels.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "labels file does not contain any class",
            ));
        }

        Ok(Self::new(labels))
    }

    pub fn get(&self, class_id: usize) -> String {
        self.labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_from_reader() {
        let content = "awake\n\ndrowsy, 255, 0, 0\n";
        let labels = ClassLabels::from_reader(Cursor::new(content)).unwrap();

        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get(0), "awake");
        assert_eq!(labels.get(1), "drowsy");
    }

    #[test]
    fn test_unknown_class_id() {
        let labels = ClassLabels::new(vec!["awake".to_string()]);

        assert_eq!(labels.get(3), "class_3");
    }

    #[test]
    fn test_empty_labels_file_is_rejected() {
        let result = ClassLabels::from_reader(Cursor::new("\n  \n"));

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::InvalidData);
    }
}
