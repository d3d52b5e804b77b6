use clap::ValueEnum;
use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use serde_json::from_str;
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::io;
use std::path::Path;

static LABEL_DIR: Dir = include_dir!("assets/labels");

/// What to do with a detected label that has no entry in the label table
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownLabels {
    /// Use the raw label as a target word
    Raw,
    /// Never offer the label as a target
    #[default]
    Ineligible,
}

/// Maps a detector label to the text shown next to it
pub trait LabelTranslator {
    fn translate(&self, label: &str) -> Option<&str>;

    fn knows(&self, label: &str) -> bool {
        self.translate(label).is_some()
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct LabelEntry {
    pub label: String,
    pub display: String,
}

#[derive(Deserialize, Clone, Debug)]
struct LabelFile {
    name: String,
    labels: Vec<LabelEntry>,
}

/// Ordered label table with display names
#[derive(Clone, Debug)]
pub struct LabelTable {
    pub name: String,
    entries: Vec<LabelEntry>,
    index: HashMap<String, usize>,
}

impl LabelTable {
    pub fn new(name: impl Into<String>, entries: Vec<LabelEntry>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.label.clone(), i))
            .collect();
        Self {
            name: name.into(),
            entries,
            index,
        }
    }

    /// The 80 COCO classes shipped with the binary
    pub fn coco() -> Result<Self, Box<dyn Error>> {
        Self::embedded("coco")
    }

    pub fn embedded(name: &str) -> Result<Self, Box<dyn Error>> {
        let file_name = format!("{name}.json");
        let file = LABEL_DIR
            .get_file(&file_name)
            .ok_or_else(|| format!("label table {file_name} not found"))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| format!("label table {file_name} is not utf-8"))?;
        let parsed: LabelFile = from_str(contents)?;
        Ok(Self::new(parsed.name, parsed.labels))
    }

    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every label in table order; the default list-mode vocabulary
    pub fn vocabulary(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.label.clone()).collect()
    }
}

impl LabelTranslator for LabelTable {
    fn translate(&self, label: &str) -> Option<&str> {
        self.index
            .get(label)
            .map(|&i| self.entries[i].display.as_str())
    }
}

/// Reads a word list: one word per line, blank lines and `#` comments skipped
pub fn load_word_file<P: AsRef<Path>>(path: P) -> io::Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_word_list(&text))
}

pub fn parse_word_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}
