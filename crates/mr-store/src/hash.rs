use crate::{Store, StoreError, Value, ValueType, format_float, parse_f64, parse_i64};

impl Store {
    /// Sets each field and returns how many were new.
    pub fn hset(
        &mut self,
        key: &[u8],
        pairs: &[(Vec<u8>, Vec<u8>)],
        now_ms: u64,
    ) -> Result<u64, StoreError> {
        let map = self.typed_or_insert(key, ValueType::Hash, now_ms, Value::as_hash_mut)?;
        let mut added = 0_u64;
        for (field, value) in pairs {
            if map.insert(field.clone(), value.clone()).is_none() {
                added += 1;
            }
        }
        self.reap_if_empty(key);
        Ok(added)
    }

    pub fn hsetnx(
        &mut self,
        key: &[u8],
        field: &[u8],
        value: &[u8],
        now_ms: u64,
    ) -> Result<bool, StoreError> {
        let map = self.typed_or_insert(key, ValueType::Hash, now_ms, Value::as_hash_mut)?;
        if map.contains_key(field) {
            return Ok(false);
        }
        map.insert(field.to_vec(), value.to_vec());
        Ok(true)
    }

    pub fn hget(
        &mut self,
        key: &[u8],
        field: &[u8],
        now_ms: u64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_hash_mut)?
            .and_then(|map| map.get(field).cloned()))
    }

    pub fn hmget(
        &mut self,
        key: &[u8],
        fields: &[Vec<u8>],
        now_ms: u64,
    ) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        let map = self.typed_mut(key, now_ms, Value::as_hash_mut)?;
        Ok(fields
            .iter()
            .map(|field| map.as_ref().and_then(|map| map.get(field).cloned()))
            .collect())
    }

    pub fn hdel(&mut self, key: &[u8], fields: &[Vec<u8>], now_ms: u64) -> Result<u64, StoreError> {
        let Some(map) = self.typed_mut(key, now_ms, Value::as_hash_mut)? else {
            return Ok(0);
        };
        let removed = fields
            .iter()
            .filter(|field| map.remove(field.as_slice()).is_some())
            .count() as u64;
        self.reap_if_empty(key);
        Ok(removed)
    }

    pub fn hexists(&mut self, key: &[u8], field: &[u8], now_ms: u64) -> Result<bool, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_hash_mut)?
            .is_some_and(|map| map.contains_key(field)))
    }

    pub fn hlen(&mut self, key: &[u8], now_ms: u64) -> Result<usize, StoreError> {
        Ok(self
            .typed_mut(key, now_ms, Value::as_hash_mut)?
            .map_or(0, |map| map.len()))
    }

    pub fn hstrlen(&mut self, key: &[u8], field: &[u8], now_ms: u64) -> Result<usize, StoreError> {
        Ok(self
            .hget(key, field, now_ms)?
            .map_or(0, |value| value.len()))
    }

    /// All field/value pairs in bytewise field order.
    pub fn hgetall(
        &mut self,
        key: &[u8],
        now_ms: u64,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let Some(map) = self.typed_mut(key, now_ms, Value::as_hash_mut)? else {
            return Ok(Vec::new());
        };
        let mut pairs: Vec<_> = map
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        pairs.sort();
        Ok(pairs)
    }

    pub fn hkeys(&mut self, key: &[u8], now_ms: u64) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self
            .hgetall(key, now_ms)?
            .into_iter()
            .map(|(field, _)| field)
            .collect())
    }

    pub fn hvals(&mut self, key: &[u8], now_ms: u64) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self
            .hgetall(key, now_ms)?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    /// A field holding something other than an integer is a kind mismatch
    /// for this operation.
    pub fn hincrby(
        &mut self,
        key: &[u8],
        field: &[u8],
        delta: i64,
        now_ms: u64,
    ) -> Result<i64, StoreError> {
        let current = match self.hget(key, field, now_ms)? {
            Some(raw) => parse_i64(&raw).map_err(|_| StoreError::WrongType)?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or(StoreError::IntegerOverflow)?;
        let map = self.typed_or_insert(key, ValueType::Hash, now_ms, Value::as_hash_mut)?;
        map.insert(field.to_vec(), next.to_string().into_bytes());
        Ok(next)
    }

    pub fn hincrbyfloat(
        &mut self,
        key: &[u8],
        field: &[u8],
        delta: f64,
        now_ms: u64,
    ) -> Result<f64, StoreError> {
        let current = match self.hget(key, field, now_ms)? {
            Some(raw) => parse_f64(&raw).map_err(|_| StoreError::WrongType)?,
            None => 0.0,
        };
        let next = current + delta;
        if !next.is_finite() {
            return Err(StoreError::ValueNotFloat);
        }
        let map = self.typed_or_insert(key, ValueType::Hash, now_ms, Value::as_hash_mut)?;
        map.insert(field.to_vec(), format_float(next).into_bytes());
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Store, StoreError};

    fn pair(field: &str, value: &str) -> (Vec<u8>, Vec<u8>) {
        (field.as_bytes().to_vec(), value.as_bytes().to_vec())
    }

    #[test]
    fn hset_counts_new_fields_only() {
        let mut store = Store::new();
        assert_eq!(store.hset(b"h", &[pair("a", "1"), pair("b", "2")], 0), Ok(2));
        assert_eq!(store.hset(b"h", &[pair("a", "9"), pair("c", "3")], 0), Ok(1));
        assert_eq!(store.hget(b"h", b"a", 0), Ok(Some(b"9".to_vec())));
        assert_eq!(store.hsetnx(b"h", b"a", b"x", 0), Ok(false));
        assert_eq!(store.hsetnx(b"h", b"d", b"4", 0), Ok(true));
        assert_eq!(store.hlen(b"h", 0), Ok(4));
    }

    #[test]
    fn getall_is_field_ordered() {
        let mut store = Store::new();
        store.hset(b"h", &[pair("b", "2"), pair("a", "1")], 0).expect("hset");
        assert_eq!(store.hgetall(b"h", 0), Ok(vec![pair("a", "1"), pair("b", "2")]));
        assert_eq!(store.hkeys(b"h", 0), Ok(vec![b"a".to_vec(), b"b".to_vec()]));
        assert_eq!(store.hvals(b"h", 0), Ok(vec![b"1".to_vec(), b"2".to_vec()]));
        assert_eq!(
            store.hmget(b"h", &[b"b".to_vec(), b"zz".to_vec()], 0),
            Ok(vec![Some(b"2".to_vec()), None])
        );
        assert_eq!(store.hmget(b"missing", &[b"a".to_vec()], 0), Ok(vec![None]));
    }

    #[test]
    fn deleting_last_field_removes_key() {
        let mut store = Store::new();
        store.hset(b"h", &[pair("a", "1")], 0).expect("hset");
        assert_eq!(store.hdel(b"h", &[b"a".to_vec(), b"a".to_vec()], 0), Ok(1));
        assert!(!store.exists(b"h", 0));
        assert_eq!(store.hlen(b"h", 0), Ok(0));
    }

    #[test]
    fn increments_are_scoped_to_field() {
        let mut store = Store::new();
        assert_eq!(store.hincrby(b"h", b"n", 5, 0), Ok(5));
        assert_eq!(store.hincrby(b"h", b"n", -2, 0), Ok(3));
        assert_eq!(store.hincrbyfloat(b"h", b"f", 1.25, 0), Ok(1.25));
        store.hset(b"h", &[pair("text", "abc")], 0).expect("hset");
        assert_eq!(store.hincrby(b"h", b"text", 1, 0), Err(StoreError::WrongType));
        assert_eq!(store.hincrbyfloat(b"h", b"text", 1.0, 0), Err(StoreError::WrongType));
        assert_eq!(store.hincrby(b"h", b"f", 1, 0), Err(StoreError::WrongType));
        assert_eq!(store.hstrlen(b"h", b"text", 0), Ok(3));
    }

    #[test]
    fn hash_ops_reject_other_kinds() {
        let mut store = Store::new();
        store.set(b"s".to_vec(), b"v".to_vec(), None, 0).expect("set");
        assert_eq!(store.hset(b"s", &[pair("a", "1")], 0), Err(StoreError::WrongType));
        assert_eq!(store.hget(b"s", b"a", 0), Err(StoreError::WrongType));
        assert_eq!(store.get(b"s", 0), Ok(Some(b"v".to_vec())));
    }
}
