//! Keypath property overrides.
//!
//! A keypath names a chain of layers, groups and items by their `nm`,
//! separated by dots. `*` matches exactly one name and `**` matches any
//! number of names, so `"**.Fill 1"` reaches every item called `Fill 1`.

use glam::{Vec2, Vec3};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Name(String),
    Any,
    AnyDepth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    segments: Vec<Segment>,
    source: String,
}

impl KeyPath {
    pub fn parse(source: &str) -> Self {
        let segments = source
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => Segment::Any,
                "**" => Segment::AnyDepth,
                name => Segment::Name(name.to_string()),
            })
            .collect();
        Self {
            segments,
            source: source.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when the keypath names exactly `path`.
    pub fn matches<S: AsRef<str>>(&self, path: &[S]) -> bool {
        fn go<S: AsRef<str>>(pattern: &[Segment], path: &[S]) -> bool {
            match pattern.split_first() {
                None => path.is_empty(),
                Some((Segment::AnyDepth, rest)) => {
                    (0..=path.len()).any(|skip| go(rest, &path[skip..]))
                }
                Some((seg, rest)) => match path.split_first() {
                    None => false,
                    Some((name, tail)) => {
                        let ok = match seg {
                            Segment::Name(n) => n == name.as_ref(),
                            _ => true,
                        };
                        ok && go(rest, tail)
                    }
                },
            }
        }
        !self.segments.is_empty() && go(&self.segments, path)
    }
}

/// A value that replaces an animated property on every matching item.
/// Colours are RGB in 0..1, opacities and scale in percent, rotation in
/// degrees, positions in the owning layer's space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    FillColor(Vec3),
    FillOpacity(f32),
    StrokeColor(Vec3),
    StrokeOpacity(f32),
    StrokeWidth(f32),
    TrAnchor(Vec2),
    TrPosition(Vec2),
    TrScale(Vec2),
    TrRotation(f32),
    TrOpacity(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    FillColor,
    FillOpacity,
    StrokeColor,
    StrokeOpacity,
    StrokeWidth,
    TrAnchor,
    TrPosition,
    TrScale,
    TrRotation,
    TrOpacity,
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::FillColor(_) => PropertyKind::FillColor,
            PropertyValue::FillOpacity(_) => PropertyKind::FillOpacity,
            PropertyValue::StrokeColor(_) => PropertyKind::StrokeColor,
            PropertyValue::StrokeOpacity(_) => PropertyKind::StrokeOpacity,
            PropertyValue::StrokeWidth(_) => PropertyKind::StrokeWidth,
            PropertyValue::TrAnchor(_) => PropertyKind::TrAnchor,
            PropertyValue::TrPosition(_) => PropertyKind::TrPosition,
            PropertyValue::TrScale(_) => PropertyKind::TrScale,
            PropertyValue::TrRotation(_) => PropertyKind::TrRotation,
            PropertyValue::TrOpacity(_) => PropertyKind::TrOpacity,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PropertyOverrides {
    entries: Vec<(KeyPath, PropertyValue)>,
}

impl PropertyOverrides {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Later overrides of the same keypath and property win.
    pub fn set(&mut self, keypath: &str, value: PropertyValue) {
        let kp = KeyPath::parse(keypath);
        self.entries
            .retain(|(k, v)| !(k == &kp && v.kind() == value.kind()));
        self.entries.push((kp, value));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn lookup<S: AsRef<str>>(&self, path: &[S], kind: PropertyKind) -> Option<PropertyValue> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .rev()
            .find(|(kp, v)| v.kind() == kind && kp.matches(path))
            .map(|(_, v)| *v)
    }
}
