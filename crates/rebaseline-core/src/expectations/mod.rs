//! TestExpectations files.
//!
//! Each directive has the shape
//!
//! ```text
//! [bug ...] [ [specifier ...] ] test/path.html [ [result ...] ] [# comment]
//! ```
//!
//! Blank lines, comments and lines that cannot be parsed are kept verbatim;
//! unparseable lines are reported by `lint` and never matched.

mod configuration;
pub mod updater;

use std::collections::BTreeSet;

pub use configuration::{BuildType, ConfigurationConverter, Specifier, TestConfiguration};
pub use updater::update_expectations_files;

/// Results a directive may list, in canonical casing.
pub const KNOWN_EXPECTATIONS: &[&str] = &[
    "Pass",
    "Failure",
    "ImageOnlyFailure",
    "Crash",
    "Timeout",
    "Skip",
    "WontFix",
    "Slow",
    "Rebaseline",
    "NeedsRebaseline",
    "NeedsManualRebaseline",
    "Missing",
    "Leak",
];

const BUG_PREFIXES: &[&str] = &[
    "crbug.com/",
    "webkit.org/b/",
    "skbug.com/",
    "code.google.com/p/v8/issues/detail?id=",
];

fn is_bug_token(token: &str) -> Option<bool> {
    if BUG_PREFIXES.iter().any(|p| token.starts_with(p)) {
        return Some(true);
    }
    if let Some(rest) = token.strip_prefix("Bug(") {
        let valid = rest
            .strip_suffix(')')
            .is_some_and(|inner| !inner.is_empty() && inner.chars().all(|c| c.is_alphanumeric() || c == '_'));
        return Some(valid);
    }
    None
}

fn canonical_expectation(token: &str) -> Option<&'static str> {
    KNOWN_EXPECTATIONS
        .iter()
        .find(|e| e.eq_ignore_ascii_case(token))
        .copied()
}

/// One line of an expectations file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationLine {
    original: String,
    bugs: Vec<String>,
    specifiers: Vec<Specifier>,
    name: Option<String>,
    expectations: Vec<String>,
    comment: Option<String>,
    error: Option<String>,
    matching_configurations: BTreeSet<TestConfiguration>,
    modified: bool,
}

#[derive(PartialEq)]
enum State {
    Start,
    Configuration,
    NameExpected,
    NameFound,
    Expectations,
    Done,
}

impl ExpectationLine {
    pub fn parse(original: &str, converter: &ConfigurationConverter) -> Self {
        let mut line = ExpectationLine {
            original: original.to_string(),
            bugs: Vec::new(),
            specifiers: Vec::new(),
            name: None,
            expectations: Vec::new(),
            comment: None,
            error: None,
            matching_configurations: BTreeSet::new(),
            modified: false,
        };

        let body = match original.find('#') {
            Some(index) => {
                line.comment = Some(original[index + 1..].to_string());
                &original[..index]
            }
            None => original,
        };
        if body.trim().is_empty() {
            return line;
        }
        line.error = line.tokenize(body, converter).err();
        if line.error.is_none() {
            line.matching_configurations = converter.to_configurations(&line.specifiers);
        }
        line
    }

    fn tokenize(&mut self, body: &str, converter: &ConfigurationConverter) -> Result<(), String> {
        if body.trim_start().starts_with("//") {
            return Err("use \"#\" instead of \"//\" for comments".to_string());
        }
        let mut state = State::Start;
        for token in body.split_whitespace() {
            if let Some(valid) = is_bug_token(token) {
                if state != State::Start {
                    return Err(format!("\"{token}\" is not at the start of the line."));
                }
                if !valid {
                    return Err(format!("unrecognized bug identifier \"{token}\""));
                }
                self.bugs.push(token.to_string());
                continue;
            }
            match token {
                "[" => match state {
                    State::Start => state = State::Configuration,
                    State::NameFound => state = State::Expectations,
                    _ => return Err("unexpected \"[\"".to_string()),
                },
                "]" => match state {
                    State::Configuration => state = State::NameExpected,
                    State::Expectations => state = State::Done,
                    _ => return Err("unexpected \"]\"".to_string()),
                },
                "//" | ":" | "=" => {
                    return Err(format!(
                        "\"{token}\" is not legal in the new TestExpectations syntax."
                    ))
                }
                _ => match state {
                    State::Configuration => {
                        let specifier = converter
                            .resolve(token)
                            .ok_or_else(|| format!("Unrecognized specifier \"{token}\""))?;
                        self.specifiers.push(specifier);
                    }
                    State::Expectations => {
                        let expectation = canonical_expectation(token)
                            .ok_or_else(|| format!("Unrecognized expectation \"{token}\""))?;
                        self.expectations.push(expectation.to_string());
                    }
                    State::Start | State::NameExpected => {
                        self.name = Some(token.to_string());
                        state = State::NameFound;
                    }
                    State::NameFound | State::Done => {
                        return Err(format!(
                            "expecting \"[\", \"#\", or end of line instead of \"{token}\""
                        ))
                    }
                },
            }
        }

        if self.name.is_none() {
            return Err("Did not find a test name.".to_string());
        }
        if state != State::NameFound && state != State::Done {
            return Err("Missing a \"]\"".to_string());
        }
        let skips = self.is_skip();
        if skips
            && self
                .expectations
                .iter()
                .any(|e| e != "Skip" && e != "WontFix")
        {
            return Err("A test marked Skip or WontFix must not have other expectations.".to_string());
        }
        Ok(())
    }

    /// Text exactly as read.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn name(&self) -> Option<&str> {
        if self.error.is_some() {
            return None;
        }
        self.name.as_deref()
    }

    pub fn bugs(&self) -> &[String] {
        &self.bugs
    }

    pub fn specifiers(&self) -> &[Specifier] {
        &self.specifiers
    }

    pub fn expectations(&self) -> &[String] {
        &self.expectations
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Why the line could not be parsed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_invalid(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_whitespace_or_comment(&self) -> bool {
        self.error.is_none() && self.name.is_none()
    }

    pub fn is_directive(&self) -> bool {
        self.name().is_some()
    }

    pub fn matching_configurations(&self) -> &BTreeSet<TestConfiguration> {
        &self.matching_configurations
    }

    pub fn matches_configuration(&self, config: &TestConfiguration) -> bool {
        self.is_directive() && self.matching_configurations.contains(config)
    }

    /// Whether the directive lists `expectation` (case-insensitive). A
    /// directive without results means `Pass`.
    pub fn has_expectation(&self, expectation: &str) -> bool {
        if self.expectations.is_empty() {
            return expectation.eq_ignore_ascii_case("Pass");
        }
        self.expectations
            .iter()
            .any(|e| e.eq_ignore_ascii_case(expectation))
    }

    /// `Skip` or `WontFix`.
    pub fn is_skip(&self) -> bool {
        self.expectations
            .iter()
            .any(|e| e == "Skip" || e == "WontFix")
    }

    /// Whether the directive names `test` itself or a directory holding it.
    pub fn applies_to(&self, test: &str) -> bool {
        match self.name() {
            Some(name) if name == test => true,
            Some(name) => {
                let dir = name.trim_end_matches('/');
                test.len() > dir.len() && test.starts_with(dir) && test[dir.len()..].starts_with('/')
            }
            None => false,
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Remove one configuration. Returns whether it was present.
    pub fn remove_configuration(&mut self, config: &TestConfiguration) -> bool {
        let removed = self.matching_configurations.remove(config);
        if removed {
            self.modified = true;
        }
        removed
    }

    /// The line as it should be written back: verbatim unless modified,
    /// otherwise one line per specifier group.
    pub fn to_text(&self, converter: &ConfigurationConverter) -> String {
        if !self.modified {
            return self.original.clone();
        }
        converter
            .to_specifier_groups(&self.matching_configurations)
            .iter()
            .map(|specifiers| self.format_with(specifiers))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_with(&self, specifiers: &[String]) -> String {
        let mut parts: Vec<String> = self.bugs.clone();
        if !specifiers.is_empty() {
            parts.push(format!("[ {} ]", specifiers.join(" ")));
        }
        if let Some(name) = &self.name {
            parts.push(name.clone());
        }
        if !self.expectations.is_empty() {
            parts.push(format!("[ {} ]", self.expectations.join(" ")));
        }
        let mut text = parts.join(" ");
        if let Some(comment) = &self.comment {
            text.push_str(" #");
            text.push_str(comment);
        }
        text
    }
}

/// Two directives for the same test applying to a shared configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub test: String,
    /// 1-based line numbers.
    pub first_line: usize,
    pub second_line: usize,
}

/// Directives touched by [`ExpectationsFile::remove_configurations`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    pub modified: usize,
    pub removed: usize,
}

/// A parsed expectations file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationsFile {
    lines: Vec<ExpectationLine>,
    trailing_newline: bool,
}

impl ExpectationsFile {
    pub fn parse(contents: &str, converter: &ConfigurationConverter) -> Self {
        let trailing_newline = contents.ends_with('\n');
        let body = contents.strip_suffix('\n').unwrap_or(contents);
        let lines = if contents.is_empty() {
            Vec::new()
        } else {
            body.split('\n')
                .map(|l| ExpectationLine::parse(l, converter))
                .collect()
        };
        ExpectationsFile {
            lines,
            trailing_newline,
        }
    }

    pub fn lines(&self) -> &[ExpectationLine] {
        &self.lines
    }

    /// Directives applying to `test`, including directory directives.
    pub fn lines_for_test<'a>(
        &'a self,
        test: &'a str,
    ) -> impl Iterator<Item = &'a ExpectationLine> + 'a {
        self.lines.iter().filter(move |line| line.applies_to(test))
    }

    /// `(1-based line number, message)` for every unparseable line.
    pub fn invalid_lines(&self) -> Vec<(usize, String)> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| line.error().map(|e| (i + 1, e.to_string())))
            .collect()
    }

    /// Pairs of directives naming the same test with overlapping
    /// configurations.
    pub fn overlapping_entries(&self) -> Vec<Overlap> {
        let directives: Vec<(usize, &ExpectationLine)> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_directive())
            .collect();
        let mut overlaps = Vec::new();
        for (i, (first_index, first)) in directives.iter().enumerate() {
            for (second_index, second) in &directives[i + 1..] {
                if first.name() == second.name()
                    && !first
                        .matching_configurations()
                        .is_disjoint(second.matching_configurations())
                {
                    overlaps.push(Overlap {
                        test: first.name().unwrap_or_default().to_string(),
                        first_line: first_index + 1,
                        second_line: second_index + 1,
                    });
                }
            }
        }
        overlaps
    }

    /// Drop `configurations` from the directives naming exactly `test`.
    /// `Skip`/`WontFix` directives are left alone. A directive left without
    /// configurations is deleted; when it was followed by a blank line, a
    /// comment or the end of the file, the blank and comment lines right
    /// before it go too.
    pub fn remove_configurations(
        &mut self,
        test: &str,
        configurations: &BTreeSet<TestConfiguration>,
    ) -> RemovalSummary {
        let mut summary = RemovalSummary::default();
        let mut doomed = vec![false; self.lines.len()];
        for (index, line) in self.lines.iter_mut().enumerate() {
            if line.name() != Some(test) || line.is_skip() {
                continue;
            }
            let mut touched = false;
            for config in configurations {
                touched |= line.remove_configuration(config);
            }
            if !touched {
                continue;
            }
            if line.matching_configurations().is_empty() {
                doomed[index] = true;
                summary.removed += 1;
            } else {
                summary.modified += 1;
            }
        }

        let mut entries: Vec<(ExpectationLine, bool)> =
            self.lines.drain(..).zip(doomed).collect();
        while let Some(mut index) = entries.iter().position(|(_, doomed)| *doomed) {
            entries.remove(index);
            let followed_by_filler = entries
                .get(index)
                .map_or(true, |(line, _)| line.is_whitespace_or_comment());
            if followed_by_filler {
                while index > 0 && entries[index - 1].0.is_whitespace_or_comment() {
                    index -= 1;
                    entries.remove(index);
                }
            }
        }
        self.lines = entries.into_iter().map(|(line, _)| line).collect();
        summary
    }

    pub fn to_text(&self, converter: &ConfigurationConverter) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut text = self
            .lines
            .iter()
            .map(|line| line.to_text(converter))
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline {
            text.push('\n');
        }
        text
    }
}
