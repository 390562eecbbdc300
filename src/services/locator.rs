//! Resolves declarative element queries against a dump of the device's UI tree.
//!
//! The dump is XML where every node carries a `bounds="[x1,y1][x2,y2]"` attribute.
//! Queries use a small XPath subset:
//!
//! ```text
//! //*[@resource-id="pkg:id/upload_button" and @clickable="true" and @enabled="true"]
//! //node[@text='Uploading…']
//! ```

use crate::core::shutdown::Shutdown;
use crate::device::Device;
use crate::error::{SyncError, SyncResult};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Text the dump tool prints after the XML (the misspelling is the tool's own).
pub const SNAPSHOT_TRAILER: &str = "UI hierchary dumped to";
/// Start of the XML when the tool emits a prolog; anything before it is noise.
pub const SNAPSHOT_HEADER: &str = "<?xml";

pub const LOCATE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementQuery {
    tag: Option<String>,
    attrs: Vec<(String, String)>,
}

impl ElementQuery {
    pub fn any() -> Self {
        Self {
            tag: None,
            attrs: Vec::new(),
        }
    }

    pub fn by_text(text: &str) -> Self {
        Self::any().with_attr("text", text)
    }

    pub fn by_resource_id(id: &str) -> Self {
        Self::any().with_attr("resource-id", id)
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn matches(&self, node: roxmltree::Node<'_, '_>) -> bool {
        if !node.is_element() {
            return false;
        }
        if let Some(tag) = &self.tag
            && node.tag_name().name() != tag
        {
            return false;
        }
        self.attrs
            .iter()
            .all(|(name, value)| node.attribute(name.as_str()) == Some(value.as_str()))
    }
}

impl fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "//{}", self.tag.as_deref().unwrap_or("*"))?;
        if self.attrs.is_empty() {
            return Ok(());
        }
        let terms: Vec<String> = self
            .attrs
            .iter()
            .map(|(name, value)| format!("@{}=\"{}\"", name, value))
            .collect();
        write!(f, "[{}]", terms.join(" and "))
    }
}

impl FromStr for ElementQuery {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SyncError::InvalidQuery(s.to_string());
        let rest = s.trim().strip_prefix("//").ok_or_else(invalid)?;

        let (tag, predicate) = match rest.find('[') {
            Some(open) => {
                let body = rest[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
                (&rest[..open], Some(body))
            }
            None => (rest, None),
        };
        let tag = tag.trim();
        if tag.is_empty() || tag.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(invalid());
        }

        let mut query = ElementQuery {
            tag: (tag != "*").then(|| tag.to_string()),
            attrs: Vec::new(),
        };
        if let Some(body) = predicate {
            query.attrs = parse_predicate(body).ok_or_else(invalid)?;
        }
        Ok(query)
    }
}

// `@a="x" and @b='y'`
fn parse_predicate(body: &str) -> Option<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    let mut rest = body.trim_start();
    loop {
        rest = rest.strip_prefix('@')?;
        let eq = rest.find('=')?;
        let name = rest[..eq].trim();
        if name.is_empty() {
            return None;
        }
        rest = rest[eq + 1..].trim_start();
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        rest = &rest[1..];
        let close = rest.find(quote)?;
        attrs.push((name.to_string(), rest[..close].to_string()));
        rest = rest[close + 1..].trim_start();

        if rest.is_empty() {
            return Some(attrs);
        }
        rest = rest.strip_prefix("and")?.trim_start();
    }
}

/// Cuts the XML document out of the raw dump output.
pub fn extract_snapshot(raw: &str) -> SyncResult<&str> {
    let start = raw.find(SNAPSHOT_HEADER).unwrap_or(0);
    let end = raw[start..]
        .find(SNAPSHOT_TRAILER)
        .map(|i| start + i)
        .unwrap_or(raw.len());
    let xml = raw[start..end].trim();
    if xml.is_empty() || !xml.starts_with('<') {
        return Err(SyncError::EmptySnapshot);
    }
    Ok(xml)
}

/// Parses `[x1,y1][x2,y2]` into its corner coordinates.
pub fn parse_bounds(bounds: &str) -> SyncResult<(i32, i32, i32, i32)> {
    let invalid = || SyncError::InvalidBounds(bounds.to_string());
    let inner = bounds
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(invalid)?;
    let (first, second) = inner.split_once("][").ok_or_else(invalid)?;

    let corner = |part: &str| -> SyncResult<(i32, i32)> {
        let (x, y) = part.split_once(',').ok_or_else(invalid)?;
        let x = x.trim().parse::<i32>().map_err(|_| invalid())?;
        let y = y.trim().parse::<i32>().map_err(|_| invalid())?;
        Ok((x, y))
    };
    let (x1, y1) = corner(first)?;
    let (x2, y2) = corner(second)?;
    Ok((x1, y1, x2, y2))
}

/// Integer midpoint of a bounds rectangle, truncating.
pub fn bounds_center(bounds: &str) -> SyncResult<Point> {
    let (x1, y1, x2, y2) = parse_bounds(bounds)?;
    let mid = |a: i32, b: i32| {
        i32::try_from((i64::from(a) + i64::from(b)) / 2)
            .map_err(|_| SyncError::InvalidBounds(bounds.to_string()))
    };
    Ok(Point {
        x: mid(x1, x2)?,
        y: mid(y1, y2)?,
    })
}

/// First element in document order matching `query`, as a click point.
pub fn find_in_snapshot(xml: &str, query: &ElementQuery) -> SyncResult<Option<Point>> {
    let doc = roxmltree::Document::parse(xml)?;
    let Some(node) = doc.descendants().find(|n| query.matches(*n)) else {
        return Ok(None);
    };
    let bounds = node
        .attribute("bounds")
        .ok_or_else(|| SyncError::InvalidBounds(String::new()))?;
    bounds_center(bounds).map(Some)
}

#[derive(Clone)]
pub struct Locator {
    device: Device,
}

impl Locator {
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    /// Dumps the UI once and resolves `query`. Not finding it is `Ok(None)`.
    pub async fn locate(&self, query: &ElementQuery) -> SyncResult<Option<Point>> {
        let raw = self.device.dump_ui().await?;
        let xml = extract_snapshot(&raw)?;
        find_in_snapshot(xml, query)
    }

    /// Like `locate`, but a missing element is `ElementNotFound`.
    pub async fn find(&self, query: &ElementQuery) -> SyncResult<Point> {
        self.locate(query)
            .await?
            .ok_or_else(|| SyncError::ElementNotFound(query.to_string()))
    }

    pub async fn exists(&self, query: &ElementQuery) -> SyncResult<bool> {
        Ok(self.locate(query).await?.is_some())
    }

    /// Polls `locate` once per interval until the element appears or `timeout` has
    /// elapsed. Dump failures count as "not yet"; exhaustion returns `None`.
    pub async fn wait_for(
        &self,
        query: &ElementQuery,
        timeout: Duration,
        shutdown: &Shutdown,
    ) -> Option<Point> {
        let started = Instant::now();
        loop {
            match self.find(query).await {
                Ok(point) => return Some(point),
                Err(SyncError::ElementNotFound(_)) => {}
                Err(e) => debug!("locate {}: {}", query, e),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                debug!("{} not found within {:?}", query, timeout);
                return None;
            }
            let pause = LOCATE_POLL_INTERVAL.min(timeout - elapsed);
            if !shutdown.sleep(pause).await {
                return None;
            }
        }
    }
}
