use crate::CommandSpec;
use camino::{Utf8Path, Utf8PathBuf};

/// One item added to an archive, relative to its group's root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZipEntry {
    /// Whole directory tree (`-D`).
    Dir(Utf8PathBuf),
    /// Single file (`-f`).
    File(Utf8PathBuf),
    /// Text file listing files to add, one per line (`-l`).
    List(Utf8PathBuf),
}

impl ZipEntry {
    fn flag(&self) -> &'static str {
        match self {
            ZipEntry::Dir(_) => "-D",
            ZipEntry::File(_) => "-f",
            ZipEntry::List(_) => "-l",
        }
    }

    fn path(&self) -> &Utf8Path {
        match self {
            ZipEntry::Dir(p) | ZipEntry::File(p) | ZipEntry::List(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
struct EntryGroup {
    root: Utf8PathBuf,
    prefix: String,
    entries: Vec<ZipEntry>,
}

/// Builder for a single zip-tool invocation.
///
/// The tool applies `-C root` and `-P prefix` to every entry that follows until the next pair,
/// so groups are emitted in insertion order with their root and prefix first.
#[derive(Debug, Clone)]
pub struct ZipCommand {
    tool: Utf8PathBuf,
    output: Utf8PathBuf,
    groups: Vec<EntryGroup>,
}

impl ZipCommand {
    pub fn new(tool: impl Into<Utf8PathBuf>, output: impl Into<Utf8PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            output: output.into(),
            groups: Vec::new(),
        }
    }

    /// Add entries stored under `prefix`, with paths taken relative to `root`.
    ///
    /// A group without entries is dropped.
    pub fn group(
        &mut self,
        root: impl Into<Utf8PathBuf>,
        prefix: impl Into<String>,
        entries: impl IntoIterator<Item = ZipEntry>,
    ) -> &mut Self {
        let entries: Vec<ZipEntry> = entries.into_iter().collect();
        if entries.is_empty() {
            return self;
        }
        self.groups.push(EntryGroup {
            root: root.into(),
            prefix: prefix.into(),
            entries,
        });
        self
    }

    pub fn to_command(&self) -> CommandSpec {
        let mut cmd = CommandSpec::new(self.tool.as_str()).args(["-d", "-o", self.output.as_str()]);
        // `-P` stays in effect until the next one, so an empty prefix only needs
        // spelling out after a group that set one.
        let mut prefix_in_effect = "";
        for group in &self.groups {
            cmd = cmd.args(["-C", group.root.as_str()]);
            if group.prefix != prefix_in_effect {
                cmd = cmd.args(["-P", group.prefix.as_str()]);
                prefix_in_effect = &group.prefix;
            }
            for entry in &group.entries {
                cmd = cmd.args([entry.flag(), entry.path().as_str()]);
            }
        }
        cmd
    }
}
