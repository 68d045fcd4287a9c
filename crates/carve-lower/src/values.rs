use std::collections::HashMap;

use carve_ir::TensorValue;

/// Runtime values for graph inputs, keyed by the producer's `index`
/// attribute.
#[derive(Clone, Debug, Default)]
pub struct ValueTable {
    values: HashMap<i64, TensorValue>,
}

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `index`, returning the value it replaces.
    pub fn insert(&mut self, index: i64, value: TensorValue) -> Option<TensorValue> {
        self.values.insert(index, value)
    }

    pub fn get(&self, index: i64) -> Option<&TensorValue> {
        self.values.get(&index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(i64, TensorValue)> for ValueTable {
    fn from_iter<I: IntoIterator<Item = (i64, TensorValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carve_ir::{DataType, TensorShape};

    #[test]
    fn later_insert_replaces_earlier_value() {
        let mut values = ValueTable::new();
        assert!(values.is_empty());
        let first = TensorValue::zeros(DataType::Float, TensorShape::new(vec![2]));
        let second = TensorValue::from_f32(TensorShape::new(vec![2]), &[1.0, 2.0]);
        assert!(values.insert(0, first.clone()).is_none());
        assert_eq!(values.insert(0, second.clone()), Some(first));
        assert_eq!(values.len(), 1);
        assert_eq!(values.get(0), Some(&second));
        assert!(values.get(1).is_none());
    }

    #[test]
    fn collects_from_pairs() {
        let shape = TensorShape::new(vec![1]);
        let values: ValueTable = [
            (3, TensorValue::from_f32(shape.clone(), &[3.0])),
            (7, TensorValue::from_f32(shape, &[7.0])),
        ]
        .into_iter()
        .collect();
        assert_eq!(values.len(), 2);
        assert!(!values.is_empty());
        assert!(values.get(7).is_some());
    }
}
