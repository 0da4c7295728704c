// src/services/images/extract.rs

//! Region-scoped image discovery over a rendered document.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ImageDescriptor, ImageRegion};
use crate::utils::url::{image_identity, infer_extension, resolve_image_url};

/// Region locators, most specific first. The first selector that matches
/// anything defines the region.
const QUESTION_LOCATORS: [&str; 3] = [
    ".QuestionRichText",
    ".QuestionHeader-detail",
    ".QuestionHeader .RichText",
];
const ANSWER_LOCATORS: [&str; 4] = [
    ".RichContent-inner",
    ".AnswerItem .RichText",
    ".Post-RichTextContainer",
    ".Post-RichText",
];
const COMMENT_LOCATORS: [&str; 3] = [
    ".CommentContent",
    ".CommentItemV2-content",
    ".NestComment .RichText",
];

/// Source attributes in priority order.
const SOURCE_ATTRS: [&str; 4] = ["data-original", "data-actualsrc", "data-src", "src"];

/// URL substrings that mark decorative images.
const URL_DENYLIST: [&str; 6] = ["avatar", "icon", "logo", "emoji", "placeholder", "1x1"];

/// Class substrings that mark decorative elements.
const CLASS_DENYLIST: [&str; 3] = ["avatar", "emoji", "icon"];

const SMALL_SIDE: u32 = 100;
const SQUARE_TOLERANCE: f64 = 0.2;

/// Run-wide set of image dedup keys. First occurrence wins.
#[derive(Debug, Default)]
pub struct SeenImages {
    keys: HashSet<String>,
}

impl SeenImages {
    /// Returns `false` when the key was already seen.
    pub fn insert(&mut self, key: String) -> bool {
        self.keys.insert(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

struct RegionLocator {
    region: ImageRegion,
    selectors: Vec<Selector>,
}

impl RegionLocator {
    fn new(region: ImageRegion, patterns: &[&str]) -> Result<Self> {
        let selectors = patterns
            .iter()
            .map(|p| parse_selector(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { region, selectors })
    }

    /// Root elements of this region; empty when no locator matches.
    fn locate<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        self.selectors
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|roots| !roots.is_empty())
            .unwrap_or_default()
    }
}

/// Extracts image descriptors from question, answer and comment regions.
pub struct ImageExtractor {
    locators: Vec<RegionLocator>,
    img: Selector,
}

impl ImageExtractor {
    pub fn new() -> Result<Self> {
        let locators = ImageRegion::ORDER
            .iter()
            .map(|region| {
                let patterns: &[&str] = match region {
                    ImageRegion::Question => &QUESTION_LOCATORS,
                    ImageRegion::Answer => &ANSWER_LOCATORS,
                    ImageRegion::Comment => &COMMENT_LOCATORS,
                };
                RegionLocator::new(*region, patterns)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            locators,
            img: parse_selector("img")?,
        })
    }

    /// Ordered, de-duplicated download list for one document.
    ///
    /// Regions are scanned question, answer, comment. An `<img>` claimed by an
    /// earlier region is never attributed to a later one, and keys already in
    /// `seen` are dropped. Filenames count from 001 per region.
    pub fn extract(
        &self,
        html: &str,
        base_url: Option<&Url>,
        seen: &mut SeenImages,
    ) -> Vec<ImageDescriptor> {
        let document = Html::parse_document(html);
        let mut claimed = HashSet::new();
        let mut descriptors = Vec::new();

        for locator in &self.locators {
            let mut seq = 0;
            for root in locator.locate(&document) {
                for img in root.select(&self.img) {
                    if !claimed.insert(img.id()) {
                        continue;
                    }
                    let Some(url) = candidate_url(img, base_url) else {
                        continue;
                    };
                    if is_denylisted(&url) || is_decorative(img, root) || is_small_square(img) {
                        log::debug!("Filtered decorative image {url}");
                        continue;
                    }

                    let mut descriptor = ImageDescriptor {
                        identity: image_identity(&url),
                        url,
                        region: locator.region,
                        filename: String::new(),
                        size: 0,
                    };
                    if !seen.insert(descriptor.dedup_key()) {
                        continue;
                    }

                    seq += 1;
                    descriptor.filename =
                        locator.region.filename(seq, infer_extension(&descriptor.url));
                    descriptors.push(descriptor);
                }
            }
        }
        descriptors
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// First non-empty, fetchable source by attribute priority.
fn candidate_url(img: ElementRef<'_>, base_url: Option<&Url>) -> Option<String> {
    SOURCE_ATTRS
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .find_map(|src| resolve_image_url(base_url, src))
}

fn is_denylisted(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    URL_DENYLIST.iter().any(|needle| lower.contains(needle))
}

/// Decorative class on the image or any ancestor below the region root.
fn is_decorative(img: ElementRef<'_>, root: ElementRef<'_>) -> bool {
    let has_decorative_class = |el: ElementRef<'_>| {
        el.value().classes().any(|class| {
            let class = class.to_ascii_lowercase();
            CLASS_DENYLIST.iter().any(|needle| class.contains(needle))
        })
    };

    if has_decorative_class(img) {
        return true;
    }
    img.ancestors()
        .take_while(|node| node.id() != root.id())
        .filter_map(ElementRef::wrap)
        .any(has_decorative_class)
}

/// Declared width and height both small and roughly square.
fn is_small_square(img: ElementRef<'_>) -> bool {
    let dimension = |name: &str| -> Option<u32> {
        let raw = img.value().attr(name)?.trim();
        raw.trim_end_matches("px").trim().parse().ok()
    };
    let (Some(width), Some(height)) = (dimension("width"), dimension("height")) else {
        return false;
    };
    if width == 0 || height == 0 {
        return true;
    }
    if width > SMALL_SIDE || height > SMALL_SIDE {
        return false;
    }
    let (long, short) = (width.max(height) as f64, width.min(height) as f64);
    long / short <= 1.0 + SQUARE_TOLERANCE
}
