/*!
Node values and read-only views of parent values.

A [`Value`] is either a real or an integer scalar, or a fixed-length vector of
either. Integer values hold category indices (for nodes that declare a finite
category set) or counts.

```rust
use mini_pgm::value::Value;

let v = Value::from(vec![1.0, 2.0, 3.0]);
assert_eq!(v.len(), 3);
assert_eq!(v.real_at(1), Some(2.0));
assert_eq!(Value::Int(2).as_real(), Some(2.0));
```
*/

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Real(f64),
    Int(i64),
    RealVec(Vec<f64>),
    IntVec(Vec<i64>),
}

impl Value {
    /// Number of elements; scalars have length one.
    pub fn len(&self) -> usize {
        match self {
            Value::Real(_) | Value::Int(_) => 1,
            Value::RealVec(v) => v.len(),
            Value::IntVec(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Real(_) | Value::Int(_))
    }

    /// True for integer-valued (category or count) values.
    pub fn is_discrete(&self) -> bool {
        matches!(self, Value::Int(_) | Value::IntVec(_))
    }

    /// The scalar as `f64`; `None` for vectors.
    pub fn as_real(&self) -> Option<f64> {
        match *self {
            Value::Real(x) => Some(x),
            Value::Int(k) => Some(k as f64),
            _ => None,
        }
    }

    /// The scalar as `i64`; `None` for reals and vectors.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Value::Int(k) => Some(k),
            _ => None,
        }
    }

    /// Element `i` as `f64`. A scalar only has element `0`.
    pub fn real_at(&self, i: usize) -> Option<f64> {
        match self {
            Value::Real(x) if i == 0 => Some(*x),
            Value::Int(k) if i == 0 => Some(*k as f64),
            Value::RealVec(v) => v.get(i).copied(),
            Value::IntVec(v) => v.get(i).map(|&k| k as f64),
            _ => None,
        }
    }

    /// Element `i` as `i64`, for integer values only.
    pub fn int_at(&self, i: usize) -> Option<i64> {
        match self {
            Value::Int(k) if i == 0 => Some(*k),
            Value::IntVec(v) => v.get(i).copied(),
            _ => None,
        }
    }

    /// Element `i` as a scalar value of the same element type.
    pub fn element(&self, i: usize) -> Option<Value> {
        match self {
            Value::Real(_) | Value::Int(_) if i == 0 => Some(self.clone()),
            Value::RealVec(v) => v.get(i).map(|&x| Value::Real(x)),
            Value::IntVec(v) => v.get(i).map(|&k| Value::Int(k)),
            _ => None,
        }
    }

    /// Overwrites element `i` with a scalar of matching element type.
    /// Returns `false` (and leaves `self` untouched) on a type or index mismatch.
    pub fn set_element(&mut self, i: usize, scalar: &Value) -> bool {
        match (self, scalar) {
            (Value::RealVec(v), Value::Real(x)) if i < v.len() => {
                v[i] = *x;
                true
            }
            (Value::IntVec(v), Value::Int(k)) if i < v.len() => {
                v[i] = *k;
                true
            }
            (Value::Real(x), Value::Real(y)) if i == 0 => {
                *x = *y;
                true
            }
            (Value::Int(k), Value::Int(j)) if i == 0 => {
                *k = *j;
                true
            }
            _ => false,
        }
    }

    /// All elements converted to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Value::Real(x) => vec![*x],
            Value::Int(k) => vec![*k as f64],
            Value::RealVec(v) => v.clone(),
            Value::IntVec(v) => v.iter().map(|&k| k as f64).collect(),
        }
    }

    pub fn has_nan(&self) -> bool {
        match self {
            Value::Real(x) => x.is_nan(),
            Value::RealVec(v) => v.iter().any(|x| x.is_nan()),
            Value::Int(_) | Value::IntVec(_) => false,
        }
    }

    /// Whether `other` has the same variant and length, i.e. could replace `self`.
    pub fn same_shape(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self.len() == other.len()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Real(x) => write!(f, "{x}"),
            Value::Int(k) => write!(f, "{k}"),
            Value::RealVec(v) => write!(f, "{v:?}"),
            Value::IntVec(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

impl From<i64> for Value {
    fn from(k: i64) -> Self {
        Value::Int(k)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::RealVec(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntVec(v)
    }
}

/// The current values of a node's parents, in declared order.
///
/// Accessors never panic on a shape mismatch: real lookups fall back to `NaN`
/// so that a malformed model is reported as a numeric instability.
#[derive(Debug, Clone, Copy)]
pub struct ParentValues<'a> {
    values: &'a [&'a Value],
}

impl<'a> ParentValues<'a> {
    pub fn new(values: &'a [&'a Value]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&'a Value> {
        self.values.get(i).copied()
    }

    /// Parent `i` as a real scalar, `NaN` if absent or not a scalar.
    pub fn real(&self, i: usize) -> f64 {
        self.get(i).and_then(Value::as_real).unwrap_or(f64::NAN)
    }

    /// Element `j` of parent `i` as a real, `NaN` if absent.
    pub fn real_at(&self, i: usize, j: usize) -> f64 {
        self.get(i).and_then(|v| v.real_at(j)).unwrap_or(f64::NAN)
    }

    /// Parent `i` as an integer scalar.
    pub fn int(&self, i: usize) -> Option<i64> {
        self.get(i).and_then(Value::as_int)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Value> + 'a {
        self.values.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_access() {
        let v = Value::IntVec(vec![3, 1, 4]);
        assert_eq!(v.len(), 3);
        assert!(v.is_discrete());
        assert_eq!(v.int_at(2), Some(4));
        assert_eq!(v.real_at(1), Some(1.0));
        assert_eq!(v.element(0), Some(Value::Int(3)));
        assert_eq!(v.element(3), None);
        assert_eq!(Value::Real(2.5).element(0), Some(Value::Real(2.5)));
        assert_eq!(Value::Real(2.5).element(1), None);
    }

    #[test]
    fn test_set_element_checks_type() {
        let mut v = Value::RealVec(vec![0.0, 0.0]);
        assert!(v.set_element(1, &Value::Real(7.0)));
        assert!(!v.set_element(0, &Value::Int(1)));
        assert!(!v.set_element(2, &Value::Real(1.0)));
        assert_eq!(v, Value::RealVec(vec![0.0, 7.0]));

        let mut s = Value::Int(1);
        assert!(s.set_element(0, &Value::Int(5)));
        assert_eq!(s, Value::Int(5));
    }

    #[test]
    fn test_parent_values_fall_back_to_nan() {
        let a = Value::Real(1.5);
        let b = Value::RealVec(vec![1.0, 2.0]);
        let vals = [&a, &b];
        let parents = ParentValues::new(&vals);
        assert_eq!(parents.real(0), 1.5);
        assert!(parents.real(1).is_nan());
        assert!(parents.real(2).is_nan());
        assert_eq!(parents.real_at(1, 1), 2.0);
        assert_eq!(parents.int(0), None);
    }

    #[test]
    fn test_same_shape() {
        assert!(Value::Real(1.0).same_shape(&Value::Real(-3.0)));
        assert!(!Value::Real(1.0).same_shape(&Value::Int(1)));
        assert!(!Value::RealVec(vec![1.0]).same_shape(&Value::RealVec(vec![1.0, 2.0])));
    }
}
