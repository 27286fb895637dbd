use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a single crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Starting,
    Running,
    Completed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Starting => "starting",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
        }
    }

    /// starting → running → completed, nothing else.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (ScanStatus::Starting, ScanStatus::Running)
                | (ScanStatus::Running, ScanStatus::Completed)
        )
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "starting" => Ok(ScanStatus::Starting),
            "running" => Ok(ScanStatus::Running),
            "completed" => Ok(ScanStatus::Completed),
            _ => Err(format!("Unknown scan status: {}", s)),
        }
    }
}

/// Status of a discovered page within a scan.
///
/// ```text
/// pending --> processing --> completed
///                       \--> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Pending => "pending",
            PageStatus::Processing => "processing",
            PageStatus::Completed => "completed",
            PageStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PageStatus::Completed | PageStatus::Failed)
    }

    pub fn can_transition_to(&self, next: PageStatus) -> bool {
        matches!(
            (self, next),
            (PageStatus::Pending, PageStatus::Processing)
                | (PageStatus::Processing, PageStatus::Completed)
                | (PageStatus::Processing, PageStatus::Failed)
        )
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PageStatus::Pending),
            "processing" => Ok(PageStatus::Processing),
            "completed" => Ok(PageStatus::Completed),
            "failed" => Ok(PageStatus::Failed),
            _ => Err(format!("Unknown page status: {}", s)),
        }
    }
}

/// One crawl run.
#[derive(Debug, Clone, Serialize)]
pub struct Scan {
    pub id: Uuid,
    pub start_url: String,
    pub status: ScanStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Aggregate page counts for a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PageCounts {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

impl PageCounts {
    /// Pages that have not reached a terminal state yet.
    pub fn unfinished(&self) -> i64 {
        self.pending + self.processing
    }
}

/// Category of an SEO finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationKind {
    MissingTitle,
    TitleLength,
    MissingDescription,
    DescriptionLength,
    BrokenImage,
    BrokenLink,
    DuplicateTitle,
    DuplicateDescription,
}

impl ObservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationKind::MissingTitle => "missing title",
            ObservationKind::TitleLength => "title length",
            ObservationKind::MissingDescription => "missing description",
            ObservationKind::DescriptionLength => "description length",
            ObservationKind::BrokenImage => "broken image",
            ObservationKind::BrokenLink => "broken link",
            ObservationKind::DuplicateTitle => "duplicate title",
            ObservationKind::DuplicateDescription => "duplicate description",
        }
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A finding produced by analysis, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewObservation {
    pub kind: ObservationKind,
    pub message: String,
}

impl NewObservation {
    pub fn new(kind: ObservationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A persisted observation, joined with the URL of its page.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub id: Uuid,
    pub page_id: Uuid,
    pub url: String,
    /// Category tag as stored (see [`ObservationKind::as_str`]).
    pub kind: String,
    pub message: String,
}

/// A title or description shared by several completed pages of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// `DuplicateTitle` or `DuplicateDescription`.
    pub kind: ObservationKind,
    pub value: String,
    /// Pages carrying `value`, sorted.
    pub urls: Vec<String>,
}

/// Structured result of analyzing one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageReport {
    pub title: String,
    pub description: String,
    pub observations: Vec<NewObservation>,
    /// Absolute image URLs referenced by the page.
    pub images: Vec<String>,
}

/// Result of trying to register a discovered link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller inserted the page (or inserted it earlier and never
    /// enqueued it) and must enqueue it.
    Claimed(Uuid),
    /// Another worker already owns this URL.
    AlreadyExists,
}

/// Result of moving a page into `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// pending → processing under the caller's lease.
    Started,
    /// The caller already held the lease (redelivery of the same job).
    Resumed,
    /// Someone else owns the page or it is already done.
    RaceLost(PageStatus),
}
