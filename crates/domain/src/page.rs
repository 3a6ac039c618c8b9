//! Page outline and per-section copy.
//!
//! The model answers with loosely shaped JSON; [`StructureDraft`] and
//! [`SectionCopyDraft`] mirror that wire shape and are converted into the
//! strongly typed [`PageStructure`] and [`SectionContent`] at the boundary.

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Section kinds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The closed set of section kinds a page may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Hero,
    Features,
    Benefits,
    Testimonials,
    Pricing,
    Faq,
    Cta,
    About,
    Team,
    Contact,
    Gallery,
    Stats,
    Process,
    Comparison,
    /// Anything the model names outside the closed set lands here.
    #[serde(other)]
    Custom,
}

impl SectionKind {
    pub const ALL: [SectionKind; 15] = [
        SectionKind::Hero,
        SectionKind::Features,
        SectionKind::Benefits,
        SectionKind::Testimonials,
        SectionKind::Pricing,
        SectionKind::Faq,
        SectionKind::Cta,
        SectionKind::About,
        SectionKind::Team,
        SectionKind::Contact,
        SectionKind::Gallery,
        SectionKind::Stats,
        SectionKind::Process,
        SectionKind::Comparison,
        SectionKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Hero => "hero",
            SectionKind::Features => "features",
            SectionKind::Benefits => "benefits",
            SectionKind::Testimonials => "testimonials",
            SectionKind::Pricing => "pricing",
            SectionKind::Faq => "faq",
            SectionKind::Cta => "cta",
            SectionKind::About => "about",
            SectionKind::Team => "team",
            SectionKind::Contact => "contact",
            SectionKind::Gallery => "gallery",
            SectionKind::Stats => "stats",
            SectionKind::Process => "process",
            SectionKind::Comparison => "comparison",
            SectionKind::Custom => "custom",
        }
    }

    /// Parse a kind name as supplied by API callers. Unknown names are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Page structure
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStatus {
    #[default]
    Pending,
    Generating,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSection {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub title: String,
    pub order: u32,
    #[serde(default)]
    pub status: SectionStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorScheme {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typography {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_font: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStructure {
    pub title: String,
    pub description: String,
    pub sections: Vec<PageSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<ColorScheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typography: Option<Typography>,
}

impl PageStructure {
    pub fn section(&self, id: &str) -> Option<&PageSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn contains_section(&self, id: &str) -> bool {
        self.section(id).is_some()
    }

    /// Sections sorted by ascending `order` (ties keep outline order).
    pub fn ordered_sections(&self) -> Vec<&PageSection> {
        let mut sections: Vec<&PageSection> = self.sections.iter().collect();
        sections.sort_by_key(|s| s.order);
        sections
    }
}

/// Wire shape of the outline JSON the model returns.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sections: Vec<SectionDraft>,
    #[serde(default)]
    pub color_scheme: Option<ColorScheme>,
    #[serde(default)]
    pub typography: Option<Typography>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionDraft {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub order: Option<u32>,
}

impl TryFrom<StructureDraft> for PageStructure {
    type Error = ExtractionError;

    /// Assign stable ids and reject outlines without sections.
    fn try_from(draft: StructureDraft) -> Result<Self, Self::Error> {
        if draft.sections.is_empty() {
            return Err(ExtractionError::Invalid(
                "page structure contains no sections".into(),
            ));
        }

        let mut sections: Vec<PageSection> = draft
            .sections
            .into_iter()
            .enumerate()
            .map(|(idx, s)| {
                let order = s.order.unwrap_or(idx as u32 + 1);
                let title = if s.title.trim().is_empty() {
                    s.kind.as_str().to_string()
                } else {
                    s.title
                };
                PageSection {
                    id: format!("section-{}", idx + 1),
                    kind: s.kind,
                    title,
                    order,
                    status: SectionStatus::Pending,
                }
            })
            .collect();
        sections.sort_by_key(|s| s.order);

        Ok(PageStructure {
            title: draft.title,
            description: draft.description,
            sections,
            color_scheme: draft.color_scheme,
            typography: draft.typography,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Section copy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToAction {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Wire shape of one section's copy as returned by the model.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionCopyDraft {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub subheadline: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<CopyItem>>,
    #[serde(default)]
    pub cta: Option<CallToAction>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

/// Headline + CTA, e.g. a hero banner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerCopy {
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<CallToAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Headline over a list of items (features, FAQ entries, testimonials...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCopy {
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheadline: Option<String>,
    pub items: Vec<CopyItem>,
}

/// Headline over a list of items ending in a call to action (pricing).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCopy {
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheadline: Option<String>,
    pub items: Vec<CopyItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<CallToAction>,
}

/// Prose with an optional call to action (cta, contact).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchCopy {
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<CallToAction>,
}

/// Long-form prose with optional imagery (about).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryCopy {
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheadline: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Image-led section with optional captions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryCopy {
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheadline: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<CopyItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Free-form copy for custom sections: every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeformCopy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subheadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<CopyItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<CallToAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Copy for one section, keyed by the section's kind.
///
/// Each variant carries only the fields its kind's guidance asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "copy", rename_all = "lowercase")]
pub enum SectionContent {
    Hero(BannerCopy),
    Features(ListCopy),
    Benefits(ListCopy),
    Testimonials(ListCopy),
    Pricing(OfferCopy),
    Faq(ListCopy),
    Cta(PitchCopy),
    About(StoryCopy),
    Team(ListCopy),
    Contact(PitchCopy),
    Gallery(GalleryCopy),
    Stats(ListCopy),
    Process(ListCopy),
    Comparison(ListCopy),
    Custom(FreeformCopy),
}

impl SectionContent {
    pub fn kind(&self) -> SectionKind {
        match self {
            SectionContent::Hero(_) => SectionKind::Hero,
            SectionContent::Features(_) => SectionKind::Features,
            SectionContent::Benefits(_) => SectionKind::Benefits,
            SectionContent::Testimonials(_) => SectionKind::Testimonials,
            SectionContent::Pricing(_) => SectionKind::Pricing,
            SectionContent::Faq(_) => SectionKind::Faq,
            SectionContent::Cta(_) => SectionKind::Cta,
            SectionContent::About(_) => SectionKind::About,
            SectionContent::Team(_) => SectionKind::Team,
            SectionContent::Contact(_) => SectionKind::Contact,
            SectionContent::Gallery(_) => SectionKind::Gallery,
            SectionContent::Stats(_) => SectionKind::Stats,
            SectionContent::Process(_) => SectionKind::Process,
            SectionContent::Comparison(_) => SectionKind::Comparison,
            SectionContent::Custom(_) => SectionKind::Custom,
        }
    }

    /// Convert a model draft into the variant for `kind`.
    ///
    /// Fields the kind does not use are dropped. A missing headline or an
    /// empty item list where the kind requires items is an extraction error.
    pub fn from_draft(kind: SectionKind, draft: SectionCopyDraft) -> Result<Self, ExtractionError> {
        if kind == SectionKind::Custom {
            return Ok(SectionContent::Custom(FreeformCopy {
                headline: draft.headline,
                subheadline: draft.subheadline,
                body: draft.body,
                items: draft.items.unwrap_or_default(),
                cta: draft.cta,
                images: draft.images.unwrap_or_default(),
            }));
        }

        let headline = draft
            .headline
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| ExtractionError::Invalid(format!("{kind} copy has no headline")))?;
        let subheadline = draft.subheadline;

        let require_items = |items: Option<Vec<CopyItem>>| {
            items
                .filter(|i| !i.is_empty())
                .ok_or_else(|| ExtractionError::Invalid(format!("{kind} copy has no items")))
        };

        let content = match kind {
            SectionKind::Hero => SectionContent::Hero(BannerCopy {
                headline,
                subheadline,
                cta: draft.cta,
                images: draft.images.unwrap_or_default(),
            }),
            SectionKind::Pricing => SectionContent::Pricing(OfferCopy {
                headline,
                subheadline,
                items: require_items(draft.items)?,
                cta: draft.cta,
            }),
            SectionKind::Cta | SectionKind::Contact => {
                let pitch = PitchCopy {
                    headline,
                    subheadline,
                    body: draft.body,
                    cta: draft.cta,
                };
                if kind == SectionKind::Cta {
                    SectionContent::Cta(pitch)
                } else {
                    SectionContent::Contact(pitch)
                }
            }
            SectionKind::About => SectionContent::About(StoryCopy {
                headline,
                subheadline,
                body: draft
                    .body
                    .filter(|b| !b.trim().is_empty())
                    .ok_or_else(|| ExtractionError::Invalid("about copy has no body".into()))?,
                images: draft.images.unwrap_or_default(),
            }),
            SectionKind::Gallery => SectionContent::Gallery(GalleryCopy {
                headline,
                subheadline,
                items: draft.items.unwrap_or_default(),
                images: draft.images.unwrap_or_default(),
            }),
            list_kind => {
                let list = ListCopy {
                    headline,
                    subheadline,
                    items: require_items(draft.items)?,
                };
                match list_kind {
                    SectionKind::Features => SectionContent::Features(list),
                    SectionKind::Benefits => SectionContent::Benefits(list),
                    SectionKind::Testimonials => SectionContent::Testimonials(list),
                    SectionKind::Faq => SectionContent::Faq(list),
                    SectionKind::Team => SectionContent::Team(list),
                    SectionKind::Stats => SectionContent::Stats(list),
                    SectionKind::Process => SectionContent::Process(list),
                    _ => SectionContent::Comparison(list),
                }
            }
        };
        Ok(content)
    }
}
