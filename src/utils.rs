/// Path-based cursor over parsed JSON documents
use serde_json::Value;

static NULL: Value = Value::Null;

/// Read-only view into a `serde_json::Value` addressed by dotted paths.
///
/// Missing values read as the zero value of the requested type, so parsing
/// code can copy fields without checking each one. Path segments that are
/// plain integers index into arrays (`"geometry.coordinates.1"`).
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    value: &'a Value,
}

impl<'a> Cursor<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// Returns a cursor at `path`, pointing at null if the path does not resolve.
    pub fn get(&self, path: &str) -> Cursor<'a> {
        Cursor {
            value: resolve(self.value, path).unwrap_or(&NULL),
        }
    }

    #[allow(dead_code)]
    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    pub fn is_object(&self) -> bool {
        self.value.is_object()
    }

    pub fn is_array(&self) -> bool {
        self.value.is_array()
    }

    /// Iterates the array at `path`; does nothing if it is not an array.
    pub fn for_each_array<F>(&self, path: &str, mut f: F)
    where
        F: FnMut(Cursor<'a>),
    {
        if let Some(items) = self.get(path).value.as_array() {
            for item in items {
                f(Cursor::new(item));
            }
        }
    }

    pub fn string(&self, path: &str) -> String {
        match self.get(path).value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    #[allow(dead_code)]
    pub fn bool(&self, path: &str) -> bool {
        match self.get(path).value {
            Value::Bool(b) => *b,
            Value::String(s) => s.parse().unwrap_or(false),
            other => num(other).map(|n| n != 0.0).unwrap_or(false),
        }
    }

    pub fn int64(&self, path: &str) -> i64 {
        let v = self.get(path).value;
        if let Some(i) = v.as_i64() {
            return i;
        }
        num(v).map(|n| n as i64).unwrap_or(0)
    }

    pub fn int32(&self, path: &str) -> i32 {
        self.int64(path) as i32
    }

    pub fn float64(&self, path: &str) -> f64 {
        num(self.get(path).value).unwrap_or(0.0)
    }

    pub fn float32(&self, path: &str) -> f32 {
        self.float64(path) as f32
    }
}

fn resolve<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Extract number from JSON value
pub fn num(v: &Value) -> Option<f64> {
    if let Some(x) = v.as_f64() {
        return Some(x);
    }
    if let Some(s) = v.as_str() {
        return s.parse::<f64>().ok();
    }
    None
}
