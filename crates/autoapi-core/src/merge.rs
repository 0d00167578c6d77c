//! Writing generated declarations into TypeScript files.
//!
//! Three write paths exist:
//!
//! * fresh write, when the target file does not exist yet;
//! * full replace, guarded by a `.bak` sibling that is restored on failure;
//! * incremental merge, which swaps same-named declarations in place and leaves
//!   unrelated declarations untouched.
//!
//! All file access goes through the [`FileSystem`] seam.

// Internal imports (std, crate)
use std::collections::BTreeSet;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use crate::emit::header::{interface_import, INTERFACE_MODULE, QS_IMPORT};
use crate::naming::capitalize;
use crate::Error;

// External imports (alphabetized)
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

/// Start of a top level declaration, capturing its name
static DECLARATION_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^export\s+(?:declare\s+)?(?:type|interface|const|function|let|enum|class)\s+([A-Za-z_$][\w$]*)")
        .expect("valid declaration pattern")
});

/// `import type { .. } from './interface'`, possibly spread over several lines
static INTERFACE_IMPORT: Lazy<Regex> = Lazy::new(|| {
    let module = regex::escape(INTERFACE_MODULE);
    Regex::new(&format!(
        r#"(?s)import\s+type\s*\{{([^}}]*)\}}\s*from\s*['"]{module}['"];?[ \t]*\n?"#
    ))
    .expect("valid interface import pattern")
});

static QS_IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^import\s+qs\b").expect("valid qs import pattern"));

/// Minimal file system surface used by the merge engine
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> impl Future<Output = bool> + Send;

    fn read_to_string(&self, path: &Path) -> impl Future<Output = io::Result<String>> + Send;

    /// Write `contents`, creating missing parent directories
    fn write(&self, path: &Path, contents: &str) -> impl Future<Output = io::Result<()>> + Send;

    fn rename(&self, from: &Path, to: &Path) -> impl Future<Output = io::Result<()>> + Send;

    fn remove_file(&self, path: &Path) -> impl Future<Output = io::Result<()>> + Send;
}

/// [`FileSystem`] backed by `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl FileSystem for TokioFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

/// How an existing target file is brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Rewrite the whole file
    Replace,
    /// Swap changed declarations in place
    Merge,
}

/// What a write did to the target file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Replaced,
    Merged,
}

/// New content for one generated file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileUpdate {
    /// Complete file content, header included
    pub full_text: String,
    /// Declaration blocks merged into an existing file
    pub declarations: String,
    /// Interface names the declarations import from `./interface`
    pub interface_imports: Vec<String>,
    pub uses_querystring: bool,
    /// Also drop the `use*` companion of every replaced function
    pub function_file: bool,
}

/// Applies [`FileUpdate`]s through a [`FileSystem`]
#[derive(Debug, Clone, Default)]
pub struct FileMergeEngine<F> {
    fs: F,
}

impl<F: FileSystem> FileMergeEngine<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    pub fn file_system(&self) -> &F {
        &self.fs
    }

    pub fn into_file_system(self) -> F {
        self.fs
    }

    pub async fn write(&self, path: &Path, update: &FileUpdate, mode: WriteMode) -> crate::Result<WriteOutcome> {
        if !self.fs.exists(path).await {
            debug!("Creating {}", path.display());
            self.fs
                .write(path, &update.full_text)
                .await
                .map_err(|e| Error::file_update(path, e))?;
            info!("Created {}", path.display());
            return Ok(WriteOutcome::Created);
        }

        match mode {
            WriteMode::Replace => {
                self.replace(path, &update.full_text).await?;
                info!("Replaced {}", path.display());
                Ok(WriteOutcome::Replaced)
            }
            WriteMode::Merge => {
                let existing = self
                    .fs
                    .read_to_string(path)
                    .await
                    .map_err(|e| Error::file_update(path, e))?;
                let merged = merge_declarations(&existing, update);
                self.fs
                    .write(path, &merged)
                    .await
                    .map_err(|e| Error::file_update(path, e))?;
                info!("Merged into {}", path.display());
                Ok(WriteOutcome::Merged)
            }
        }
    }

    /// Rename to backup, write, delete backup. Any failure puts the backup back.
    async fn replace(&self, path: &Path, contents: &str) -> crate::Result<()> {
        let backup = backup_path(path);
        let result = async {
            self.fs.rename(path, &backup).await?;
            self.fs.write(path, contents).await?;
            self.fs.remove_file(&backup).await
        }
        .await;

        if let Err(source) = result {
            if self.fs.exists(&backup).await {
                warn!("Restoring {} from backup", path.display());
                if let Err(e) = self.fs.rename(&backup, path).await {
                    warn!("Failed to restore backup {}: {}", backup.display(), e);
                }
            }
            return Err(Error::file_update(path, source));
        }
        Ok(())
    }
}

/// `<path>.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Names declared at the top level of `text`, in order of appearance
pub fn declared_names(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| DECLARATION_START.captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Merge `update.declarations` into `existing`.
///
/// Declarations with a name declared by the update are removed together with
/// the comment lines directly above them. The new text takes the place of the
/// first removed declaration, or is appended when nothing was removed. Imports
/// are then brought in line with the resulting body.
pub fn merge_declarations(existing: &str, update: &FileUpdate) -> String {
    let mut names: BTreeSet<String> = declared_names(&update.declarations).into_iter().collect();
    if update.function_file {
        let companions: Vec<String> = names.iter().map(|n| format!("use{}", capitalize(n))).collect();
        names.extend(companions);
    }

    let (mut lines, insert_at) = excise(existing, &names);
    let incoming = update.declarations.trim();

    match insert_at {
        Some(at) => {
            let mut block: Vec<String> = incoming.lines().map(str::to_string).collect();
            if lines.get(at).is_some_and(|line| !line.trim().is_empty()) {
                block.push(String::new());
            }
            lines.splice(at..at, block);
        }
        None if !incoming.is_empty() => {
            while lines.last().is_some_and(|line| line.trim().is_empty()) {
                lines.pop();
            }
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.extend(incoming.lines().map(str::to_string));
        }
        None => {}
    }
    lines.dedup_by(|a, b| a.trim().is_empty() && b.trim().is_empty());

    let mut text = lines.join("\n");
    if update.uses_querystring && !QS_IMPORT_LINE.is_match(&text) {
        text = insert_import(&text, QS_IMPORT);
    }
    text = sync_interface_import(&text, &update.interface_imports);

    let mut text = text.trim_end().to_string();
    text.push('\n');
    text
}

/// Where a line-oriented scan stands relative to a removed declaration
enum ScanState {
    Outside,
    /// Inside a removed block
    InBlock(BracketScanner),
    /// After `export type X =`, swallowing `|` and `&` continuation lines
    AliasContinuation,
}

/// Lexical context of the bracket scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    Code,
    BlockComment,
    Quoted(char),
    Template,
}

/// Counts open brackets of TypeScript source fed line by line, ignoring
/// brackets inside comments, string literals and template literals
#[derive(Debug, Clone, Copy)]
struct BracketScanner {
    depth: i32,
    lexeme: Lexeme,
}

impl BracketScanner {
    fn new() -> Self {
        Self {
            depth: 0,
            lexeme: Lexeme::Code,
        }
    }

    fn feed(&mut self, line: &str) -> i32 {
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match self.lexeme {
                Lexeme::Code => match c {
                    '/' if chars.peek() == Some(&'/') => break,
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        self.lexeme = Lexeme::BlockComment;
                    }
                    '\'' | '"' => self.lexeme = Lexeme::Quoted(c),
                    '`' => self.lexeme = Lexeme::Template,
                    '{' | '(' | '[' => self.depth += 1,
                    '}' | ')' | ']' => self.depth -= 1,
                    _ => {}
                },
                Lexeme::BlockComment => {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        self.lexeme = Lexeme::Code;
                    }
                }
                Lexeme::Quoted(_) | Lexeme::Template if c == '\\' => {
                    chars.next();
                }
                Lexeme::Quoted(quote) => {
                    if c == quote {
                        self.lexeme = Lexeme::Code;
                    }
                }
                Lexeme::Template => {
                    if c == '`' {
                        self.lexeme = Lexeme::Code;
                    }
                }
            }
        }
        // Plain string literals never span lines
        if let Lexeme::Quoted(_) = self.lexeme {
            self.lexeme = Lexeme::Code;
        }
        self.depth
    }
}

/// Remove top level declarations named in `names`. Returns the remaining lines
/// and the index where the first removed declaration started.
fn excise(existing: &str, names: &BTreeSet<String>) -> (Vec<String>, Option<usize>) {
    let mut out: Vec<String> = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut insert_at = None;
    let mut state = ScanState::Outside;

    for line in existing.lines() {
        if let ScanState::AliasContinuation = state {
            let trimmed = line.trim_start();
            if trimmed.starts_with('|') || trimmed.starts_with('&') {
                continue;
            }
            state = ScanState::Outside;
        }

        if let ScanState::InBlock(scanner) = &mut state {
            if scanner.feed(line) <= 0 {
                state = ScanState::Outside;
            }
            continue;
        }

        let target = DECLARATION_START
            .captures(line)
            .is_some_and(|caps| names.contains(&caps[1]));

        if target {
            // Comment lines directly above go with the declaration
            let keep = pending
                .iter()
                .rposition(|l| l.trim().is_empty())
                .map_or(0, |i| i + 1);
            pending.truncate(keep);
            out.append(&mut pending);
            insert_at.get_or_insert(out.len());
            let mut scanner = BracketScanner::new();
            state = if scanner.feed(line) > 0 {
                ScanState::InBlock(scanner)
            } else if line.trim_end().ends_with('=') {
                ScanState::AliasContinuation
            } else {
                ScanState::Outside
            };
        } else if is_comment_or_blank(line) {
            pending.push(line.to_string());
        } else {
            out.append(&mut pending);
            out.push(line.to_string());
        }
    }
    out.append(&mut pending);

    (out, insert_at)
}

fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with("/*") || trimmed.starts_with('*') || trimmed.starts_with("//")
}

/// Insert `import` before the first import line, or below the leading comments
fn insert_import(text: &str, import: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    let at = lines
        .iter()
        .position(|line| line.starts_with("import"))
        .unwrap_or_else(|| {
            lines
                .iter()
                .position(|line| !line.trim_start().starts_with("//") && !line.trim_start().starts_with("/*"))
                .unwrap_or(lines.len())
        });
    lines.insert(at, import);
    lines.join("\n")
}

/// Rebuild the interface import from the existing and incoming names, keeping
/// only names the body still mentions
fn sync_interface_import(text: &str, incoming: &[String]) -> String {
    let existing = INTERFACE_IMPORT.captures(text).map(|caps| {
        caps[1]
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });

    if existing.is_none() && incoming.is_empty() {
        return text.to_string();
    }

    let body = INTERFACE_IMPORT.replace(text, "");
    let names: BTreeSet<String> = existing
        .unwrap_or_default()
        .into_iter()
        .chain(incoming.iter().cloned())
        .filter(|name| contains_word(&body, name))
        .collect();
    let names: Vec<String> = names.into_iter().collect();

    match interface_import(&names) {
        Some(import) if INTERFACE_IMPORT.is_match(text) => INTERFACE_IMPORT
            .replace(text, regex::NoExpand(&format!("{import}\n")))
            .into_owned(),
        Some(import) => insert_import(text, &import),
        None => body.into_owned(),
    }
}

/// Whether `word` occurs in `haystack` as a whole identifier
fn contains_word(haystack: &str, word: &str) -> bool {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory file system with injectable write failures
    #[derive(Debug, Default)]
    pub(crate) struct MemoryFileSystem {
        files: Mutex<HashMap<PathBuf, String>>,
        fail_writes: AtomicBool,
    }

    impl MemoryFileSystem {
        pub(crate) fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
            self.files.lock().unwrap().insert(path.into(), contents.to_string());
            self
        }

        pub(crate) fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn get(&self, path: impl AsRef<Path>) -> Option<String> {
            self.files.lock().unwrap().get(path.as_ref()).cloned()
        }

        pub(crate) fn paths(&self) -> Vec<PathBuf> {
            let mut paths: Vec<_> = self.files.lock().unwrap().keys().cloned().collect();
            paths.sort();
            paths
        }
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, path.display().to_string())
    }

    impl FileSystem for MemoryFileSystem {
        async fn exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }

        async fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.get(path).ok_or_else(|| not_found(path))
        }

        async fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }

        async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            let mut files = self.files.lock().unwrap();
            let contents = files.remove(from).ok_or_else(|| not_found(from))?;
            files.insert(to.to_path_buf(), contents);
            Ok(())
        }

        async fn remove_file(&self, path: &Path) -> io::Result<()> {
            self.files
                .lock()
                .unwrap()
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| not_found(path))
        }
    }
}
