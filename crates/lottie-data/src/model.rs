use serde::{de::DeserializeOwned, de::Error as _, Deserialize, Deserializer, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LottieJson {
    #[serde(default)]
    pub v: Option<String>,
    #[serde(default)]
    pub nm: Option<String>,
    pub ip: f32,
    pub op: f32,
    pub fr: f32,
    #[serde(deserialize_with = "whole_u32")]
    pub w: u32,
    #[serde(deserialize_with = "whole_u32")]
    pub h: u32,
    #[serde(default)]
    pub ddd: Option<u8>,
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Layer {
    #[serde(default)]
    pub ty: u8,
    #[serde(default, deserialize_with = "opt_whole_u32")]
    pub ind: Option<u32>,
    #[serde(default, deserialize_with = "opt_whole_u32")]
    pub parent: Option<u32>,
    #[serde(default)]
    pub nm: Option<String>,
    pub ip: f32,
    pub op: f32,
    #[serde(default)]
    pub st: f32, // Start time
    #[serde(default = "default_one")]
    pub sr: f32, // Time stretch (1.0 = normal, >1 = slower)
    #[serde(default)]
    pub ks: Transform,
    #[serde(default)]
    pub ao: Option<u8>, // Auto-orient along the position path
    #[serde(default)]
    pub tm: Option<Property<f32>>, // Time remap, in seconds
    #[serde(default)]
    pub ddd: Option<u8>,
    #[serde(default)]
    pub hd: Option<bool>,
    #[serde(default)]
    pub bm: Option<u8>,

    #[serde(default, rename = "masksProperties")]
    pub masks_properties: Option<Vec<MaskProperties>>,
    #[serde(default)]
    pub tt: Option<u8>, // Matte mode (1=Alpha, 2=Inverted Alpha, 3=Luma, 4=Inverted Luma)
    #[serde(default, deserialize_with = "opt_whole_u32")]
    pub tp: Option<u32>, // Index of the layer used as matte
    #[serde(default)]
    pub td: Option<u8>, // 1 when another layer uses this one as its matte
    #[serde(default)]
    pub ef: Option<Vec<Effect>>,
    #[serde(default)]
    pub sy: Option<Vec<serde_json::Value>>, // Layer styles

    #[serde(default, rename = "refId")]
    pub ref_id: Option<String>, // Precomp, Image
    #[serde(default, deserialize_with = "opt_whole_u32")]
    pub w: Option<u32>, // Precomp clip width
    #[serde(default, deserialize_with = "opt_whole_u32")]
    pub h: Option<u32>, // Precomp clip height
    #[serde(default, rename = "sc")]
    pub color: Option<String>, // Solid color "#rrggbb"
    #[serde(default, deserialize_with = "opt_whole_u32")]
    pub sw: Option<u32>, // Solid width
    #[serde(default, deserialize_with = "opt_whole_u32")]
    pub sh: Option<u32>, // Solid height
    #[serde(default)]
    pub shapes: Option<Vec<Shape>>,
    #[serde(default)]
    pub t: Option<serde_json::Value>, // Text data, only inspected for presence
}

fn default_one() -> f32 {
    1.0
}

/// Sizes and indices are integers, but exporters often write them as
/// floats (`512.0`).
fn whole_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let v = f64::deserialize(deserializer)?;
    if !v.is_finite() || v < 0.0 || v > u32::MAX as f64 {
        return Err(D::Error::custom(format!("expected a non-negative integer, got {v}")));
    }
    Ok(v.round() as u32)
}

fn opt_whole_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Whole(#[serde(deserialize_with = "whole_u32")] u32);

    Ok(Option::<Whole>::deserialize(deserializer)?.map(|Whole(v)| v))
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MaskProperties {
    #[serde(default)]
    pub inv: bool,
    #[serde(default)]
    pub mode: Option<String>,
    pub pt: Property<BezierPath>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default)]
    pub x: Property<f32>, // Expansion
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default, rename = "f")]
    pub feather: Property<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Effect {
    #[serde(default)]
    pub ty: Option<u8>,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub en: Option<u8>,
}

// Shapes

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "ty")]
pub enum Shape {
    #[serde(rename = "gr")]
    Group(GroupShape),
    #[serde(rename = "rc")]
    Rect(RectShape),
    #[serde(rename = "el")]
    Ellipse(EllipseShape),
    #[serde(rename = "fl")]
    Fill(FillShape),
    #[serde(rename = "st")]
    Stroke(StrokeShape),
    #[serde(rename = "gf")]
    GradientFill(GradientFillShape),
    #[serde(rename = "gs")]
    GradientStroke(GradientStrokeShape),
    #[serde(rename = "tr")]
    Transform(TransformShape),
    #[serde(rename = "sh")]
    Path(PathShape),
    #[serde(rename = "tm")]
    Trim(TrimShape),
    #[serde(rename = "sr")]
    Polystar(PolystarShape),
    #[serde(rename = "rp")]
    Repeater(RepeaterShape),
    #[serde(rename = "rd")]
    RoundCorners(RoundCornersShape),
    #[serde(rename = "mm")]
    MergePaths(MergePathsShape),
    #[serde(rename = "zz")]
    ZigZag(NamedShape),
    #[serde(rename = "pb")]
    PuckerBloat(NamedShape),
    #[serde(rename = "tw")]
    Twist(NamedShape),
    #[serde(rename = "op")]
    OffsetPath(NamedShape),
    #[serde(rename = "wgl")]
    WigglePath(NamedShape),
    #[serde(other)]
    Unknown,
}

impl Shape {
    /// Short type code as it appears in the document.
    pub fn type_code(&self) -> &'static str {
        match self {
            Shape::Group(_) => "gr",
            Shape::Rect(_) => "rc",
            Shape::Ellipse(_) => "el",
            Shape::Fill(_) => "fl",
            Shape::Stroke(_) => "st",
            Shape::GradientFill(_) => "gf",
            Shape::GradientStroke(_) => "gs",
            Shape::Transform(_) => "tr",
            Shape::Path(_) => "sh",
            Shape::Trim(_) => "tm",
            Shape::Polystar(_) => "sr",
            Shape::Repeater(_) => "rp",
            Shape::RoundCorners(_) => "rd",
            Shape::MergePaths(_) => "mm",
            Shape::ZigZag(_) => "zz",
            Shape::PuckerBloat(_) => "pb",
            Shape::Twist(_) => "tw",
            Shape::OffsetPath(_) => "op",
            Shape::WigglePath(_) => "wgl",
            Shape::Unknown => "unknown",
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Shape::Group(s) => s.nm.as_deref(),
            Shape::Rect(s) => s.nm.as_deref(),
            Shape::Ellipse(s) => s.nm.as_deref(),
            Shape::Fill(s) => s.nm.as_deref(),
            Shape::Stroke(s) => s.nm.as_deref(),
            Shape::GradientFill(s) => s.nm.as_deref(),
            Shape::GradientStroke(s) => s.nm.as_deref(),
            Shape::Transform(_) => None,
            Shape::Path(s) => s.nm.as_deref(),
            Shape::Trim(s) => s.nm.as_deref(),
            Shape::Polystar(s) => s.nm.as_deref(),
            Shape::Repeater(s) => s.nm.as_deref(),
            Shape::RoundCorners(s) => s.nm.as_deref(),
            Shape::MergePaths(s) => s.nm.as_deref(),
            Shape::ZigZag(s)
            | Shape::PuckerBloat(s)
            | Shape::Twist(s)
            | Shape::OffsetPath(s)
            | Shape::WigglePath(s) => s.nm.as_deref(),
            Shape::Unknown => None,
        }
    }

    /// Items flagged `hd` are authored but switched off.
    pub fn is_hidden(&self) -> bool {
        match self {
            Shape::Group(s) => s.hd,
            Shape::Rect(s) => s.hd,
            Shape::Ellipse(s) => s.hd,
            Shape::Fill(s) => s.hd,
            Shape::Stroke(s) => s.hd,
            Shape::GradientFill(s) => s.hd,
            Shape::GradientStroke(s) => s.hd,
            Shape::Path(s) => s.hd,
            Shape::Polystar(s) => s.hd,
            Shape::ZigZag(s)
            | Shape::PuckerBloat(s)
            | Shape::Twist(s)
            | Shape::OffsetPath(s)
            | Shape::WigglePath(s) => s.hd,
            _ => false,
        }
    }
}

/// Modifiers only recognised so they can be reported by name.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NamedShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MergePathsShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub mm: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PolystarShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: bool,
    pub p: PositionProperty,
    pub or: Property<f32>,
    #[serde(default)]
    pub os: Property<f32>,
    #[serde(default)]
    pub r: Property<f32>,
    pub pt: Property<f32>,
    #[serde(default = "default_star")]
    pub sy: u8, // 1 = star, 2 = polygon
    #[serde(default)]
    pub ir: Option<Property<f32>>,
    #[serde(default)]
    pub is: Option<Property<f32>>,
}

fn default_star() -> u8 {
    1
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RepeaterShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub c: Property<f32>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default = "default_repeater_mode")]
    pub m: u8, // 1 = copies above, 2 = copies below
    pub tr: RepeaterTransform,
}

fn default_repeater_mode() -> u8 {
    1
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RepeaterTransform {
    #[serde(flatten)]
    pub t: Transform,
    #[serde(default)]
    pub so: Property<f32>,
    #[serde(default)]
    pub eo: Property<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RoundCornersShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub r: Property<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GroupShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: bool,
    #[serde(default)]
    pub it: Vec<Shape>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RectShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: bool,
    pub s: Property<Vec<f32>>,
    pub p: Property<Vec<f32>>,
    #[serde(default)]
    pub r: Property<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EllipseShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: bool,
    pub s: Property<Vec<f32>>,
    pub p: Property<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FillShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: bool,
    pub c: Property<Vec<f32>>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default)]
    pub r: Option<u8>, // 1 = non-zero, 2 = even-odd
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StrokeShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: bool,
    pub c: Property<Vec<f32>>,
    pub w: Property<f32>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default)]
    pub lc: u8,
    #[serde(default)]
    pub lj: u8,
    #[serde(default)]
    pub ml: Option<f32>,
    #[serde(default)]
    pub d: Vec<DashProperty>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DashProperty {
    #[serde(default)]
    pub n: Option<String>,
    pub v: Property<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GradientFillShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: bool,
    #[serde(default)]
    pub o: Property<f32>,
    pub s: Property<Vec<f32>>,
    pub e: Property<Vec<f32>>,
    #[serde(default = "default_one_u8")]
    pub t: u8, // 1 = linear, 2 = radial
    pub g: GradientColors,
    #[serde(default)]
    pub h: Property<f32>, // Highlight length, percent
    #[serde(default)]
    pub a: Property<f32>, // Highlight angle, degrees
    #[serde(default)]
    pub r: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GradientStrokeShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: bool,
    #[serde(default)]
    pub o: Property<f32>,
    pub w: Property<f32>,
    pub s: Property<Vec<f32>>,
    pub e: Property<Vec<f32>>,
    #[serde(default = "default_one_u8")]
    pub t: u8,
    pub g: GradientColors,
    #[serde(default)]
    pub h: Property<f32>,
    #[serde(default)]
    pub a: Property<f32>,
    #[serde(default)]
    pub lc: u8,
    #[serde(default)]
    pub lj: u8,
    #[serde(default)]
    pub ml: Option<f32>,
    #[serde(default)]
    pub d: Vec<DashProperty>,
}

fn default_one_u8() -> u8 {
    1
}

/// Raw gradient data: `p` colour stops as `[t, r, g, b]` quadruples, optionally
/// followed by `[t, a]` alpha pairs.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GradientColors {
    #[serde(default)]
    pub p: u32,
    pub k: Property<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PathShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: bool,
    pub ks: Property<BezierPath>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrimShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub s: Property<f32>,
    #[serde(default)]
    pub e: Property<f32>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default = "default_one_u8")]
    pub m: u8, // 1 = simultaneously, 2 = individually
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransformShape {
    #[serde(flatten)]
    pub t: Transform,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Transform {
    #[serde(default)]
    pub a: Property<Vec<f32>>, // Anchor
    #[serde(default)]
    pub p: PositionProperty,
    #[serde(default)]
    pub s: Property<Vec<f32>>, // Scale, percent
    #[serde(default, alias = "rz")]
    pub r: Property<f32>, // Rotation, degrees clockwise
    #[serde(default)]
    pub sk: Property<f32>, // Skew amount in degrees
    #[serde(default)]
    pub sa: Property<f32>, // Skew axis in degrees
    #[serde(default)]
    pub o: Property<f32>, // Opacity, percent
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum PositionProperty {
    Split {
        x: Property<f32>,
        y: Property<f32>,
    },
    Unified(Property<Vec<f32>>),
}

impl Default for PositionProperty {
    fn default() -> Self {
        PositionProperty::Unified(Property::default())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Property<T> {
    #[serde(default)]
    pub a: u8,
    #[serde(default)]
    #[serde(bound(deserialize = "T: DeserializeOwned"))]
    pub k: Value<T>,
    #[serde(default)]
    pub ix: Option<u32>,
    #[serde(default)]
    pub x: Option<String>, // Expression source
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Property {
            a: 0,
            k: Value::Default,
            ix: None,
            x: None,
        }
    }
}

impl<T> Property<T> {
    pub fn constant(value: T) -> Self {
        Property {
            a: 0,
            k: Value::Static(value),
            ix: None,
            x: None,
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(&self.k, Value::Animated(kfs) if !kfs.is_empty())
    }
}

#[derive(Debug, Serialize, Clone)]
pub enum Value<T> {
    Default,
    Static(T),
    Animated(Vec<Keyframe<T>>),
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Value<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;

        if v.is_null() || v.as_array().is_some_and(|arr| arr.is_empty()) {
            return Ok(Value::Default);
        }

        // Keyframe lists are arrays of objects carrying a `t`.
        let looks_animated = v
            .as_array()
            .and_then(|arr| arr.first())
            .is_some_and(|first| first.get("t").is_some());
        if looks_animated {
            return serde_json::from_value::<Vec<Keyframe<T>>>(v)
                .map(Value::Animated)
                .map_err(D::Error::custom);
        }

        let static_err = match serde_json::from_value::<T>(v.clone()) {
            Ok(val) => return Ok(Value::Static(val)),
            Err(e) => e,
        };

        // Scalars are often wrapped in a one-element array.
        if let Ok(vec) = serde_json::from_value::<Vec<T>>(v) {
            if let Some(first) = vec.into_iter().next() {
                return Ok(Value::Static(first));
            }
        }

        Err(D::Error::custom(format!(
            "unrecognised property value: {static_err}"
        )))
    }
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Value::Default
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Keyframe<T> {
    pub t: f32,
    #[serde(default, deserialize_with = "deserialize_keyframe_value")]
    pub s: Option<T>,
    #[serde(default, deserialize_with = "deserialize_keyframe_value")]
    pub e: Option<T>,
    #[serde(default)]
    pub i: Option<BezierTangent>,
    #[serde(default)]
    pub o: Option<BezierTangent>,
    #[serde(default)]
    pub to: Option<Vec<f32>>,
    #[serde(default)]
    pub ti: Option<Vec<f32>>,
    #[serde(default)]
    pub h: Option<u8>,
}

fn deserialize_keyframe_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    if v.is_null() {
        return Ok(None);
    }

    // Scalar and path keyframes wrap their value in an array: `"s": [50]`.
    if let Ok(vec) = serde_json::from_value::<Vec<T>>(v.clone()) {
        if vec.len() == 1 {
            return Ok(vec.into_iter().next());
        }
    }

    serde_json::from_value(v).map(Some).map_err(D::Error::custom)
}

/// Easing handle, `{"x": [0.48], "y": [1]}`. Some exporters write bare numbers.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BezierTangent {
    #[serde(deserialize_with = "deserialize_scalar_or_vec")]
    pub x: Vec<f32>,
    #[serde(deserialize_with = "deserialize_scalar_or_vec")]
    pub y: Vec<f32>,
}

fn deserialize_scalar_or_vec<'de, D>(deserializer: D) -> Result<Vec<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ScalarOrVec {
        Scalar(f32),
        Vec(Vec<f32>),
    }

    Ok(match ScalarOrVec::deserialize(deserializer)? {
        ScalarOrVec::Scalar(v) => vec![v],
        ScalarOrVec::Vec(v) => v,
    })
}

pub type Vec2 = [f32; 2];

/// Cubic bezier path; `i`/`o` tangents are relative to their vertex.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BezierPath {
    #[serde(default)]
    pub c: bool,
    #[serde(default)]
    pub i: Vec<Vec2>,
    #[serde(default)]
    pub o: Vec<Vec2>,
    #[serde(default)]
    pub v: Vec<Vec2>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Asset {
    pub id: String,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub layers: Option<Vec<Layer>>,
    #[serde(default, deserialize_with = "opt_whole_u32")]
    pub w: Option<u32>,
    #[serde(default, deserialize_with = "opt_whole_u32")]
    pub h: Option<u32>,
    #[serde(default)]
    pub u: Option<String>, // Directory of an external image
    #[serde(default)]
    pub p: Option<String>, // File name or data URI
    #[serde(default)]
    pub e: Option<u8>, // 1 when `p` is embedded
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Marker {
    #[serde(default)]
    pub cm: Option<String>,
    #[serde(default)]
    pub tm: Option<f32>,
    #[serde(default)]
    pub dr: Option<f32>,
}
