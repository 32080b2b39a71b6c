//! Version bump, changelog entry, tag and push.

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use super::{run_command, Layout};
use crate::error::{Error, Result};

const MINOR_MARKER: &str = "----------";
const MAJOR_MARKER: &str = "==========";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseLevel {
    Minor,
    Major,
}

impl fmt::Display for ReleaseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// `MAJOR.MINOR` version as stored in `VERSION`; minor is printed with two
/// digits (`1.03`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    /// Minor bumps keep the major number; major bumps reset minor to 1.
    pub fn bump(self, level: ReleaseLevel) -> Self {
        match level {
            ReleaseLevel::Minor => Self {
                major: self.major,
                minor: self.minor + 1,
            },
            ReleaseLevel::Major => Self {
                major: self.major + 1,
                minor: 1,
            },
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::Release(format!("Invalid version '{}', expected MAJOR.MINOR", s));
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

/// Source of the release comment.
pub trait Prompt {
    fn ask(&self, prompt: &str) -> Result<String>;
}

/// Asks on the terminal.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn ask(&self, prompt: &str) -> Result<String> {
        dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| Error::Release(format!("Could not read comment: {}", e)))
    }
}

/// Insert the entry for `version` into the changelog text.
///
/// Minor: `- **<version>**: <comment>` after the first `----------` line.
/// Major: a new `Version <major>` section after the first `==========` line.
pub fn insert_changelog(
    changes: &str,
    level: ReleaseLevel,
    version: Version,
    comment: &str,
) -> Result<String> {
    let entry = format!("- **{}**: {}", version, comment);
    let (marker, to_add) = match level {
        ReleaseLevel::Minor => (MINOR_MARKER, vec![entry]),
        ReleaseLevel::Major => (
            MAJOR_MARKER,
            vec![
                format!("Version {}", version.major),
                MINOR_MARKER.to_string(),
                entry,
                String::new(),
            ],
        ),
    };

    let mut lines: Vec<String> = changes.split('\n').map(str::to_string).collect();
    let index = lines
        .iter()
        .position(|l| l == marker)
        .ok_or_else(|| Error::Release(format!("No '{}' line in the changelog", marker)))?;
    lines.splice(index + 1..index + 1, to_add);

    Ok(lines.join("\n"))
}

/// Annotation of the release tag: the comment wrapped in double quotes.
fn tag_message(comment: &str) -> String {
    format!("\"{}\"", comment)
}

fn read_version(layout: &Layout) -> Result<Version> {
    std::fs::read_to_string(layout.version_file())?.parse()
}

/// Rewrite `CHANGES.rst` and `VERSION` for a release of `level`.
pub fn prepare_release(layout: &Layout, level: ReleaseLevel, comment: &str) -> Result<Version> {
    let version = read_version(layout)?.bump(level);

    let changes = std::fs::read_to_string(layout.changes_file())?;
    let changes = insert_changelog(&changes, level, version, comment)?;
    std::fs::write(layout.changes_file(), changes)?;
    std::fs::write(layout.version_file(), format!("{}\n", version))?;

    Ok(version)
}

/// Cut a release: prompt for a comment, update `VERSION` and `CHANGES.rst`,
/// amend them into the last commit, tag `v<version>` and force-push master
/// with tags.
///
/// An empty comment aborts before anything changes and returns 0. The git
/// steps stop at the first failure, whose code is returned.
pub async fn release(layout: &Layout, level: ReleaseLevel, prompt: &dyn Prompt) -> Result<i32> {
    let next = read_version(layout)?.bump(level);
    let comment = prompt.ask(&format!("Comment for {} release v{}", level, next))?;
    if comment.is_empty() {
        println!("empty comment, aborted");
        return Ok(0);
    }

    let version = prepare_release(layout, level, &comment)?;
    info!("Releasing v{}", version);

    let tag = format!("v{}", version);
    let message = tag_message(&comment);
    let steps: [&[&str]; 4] = [
        &[
            "commit",
            "VERSION",
            "CHANGES.rst",
            "--amend",
            "--no-edit",
        ],
        &["tag", "-a", tag.as_str(), "-m", message.as_str()],
        &["push", "origin", "--tags"],
        &["push", "origin", "master", "-f"],
    ];
    for args in steps {
        let code = run_command("git", args, layout.root()).await?;
        if code != 0 {
            warn!("git {} failed with code {}", args.join(" "), code);
            return Ok(code);
        }
    }

    Ok(0)
}
