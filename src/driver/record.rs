//! Record - 쿼리 결과 레코드
//!
//! RECORD 메시지의 값 목록과 RUN 응답의 컬럼 이름

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

use crate::bolt::mapper::{self, Node};
use crate::bolt::message::Signature;
use crate::bolt::packstream::{PackStreamValue, PackedStruct};
use crate::bolt::{BoltError, BoltResult};

// ============================================================================
// Record - 단일 레코드
// ============================================================================

/// 쿼리 결과 레코드
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 컬럼 키
    keys: Vec<String>,
    /// 값들
    values: Vec<PackStreamValue>,
    /// 키-인덱스 매핑
    key_index: HashMap<String, usize>,
}

impl Record {
    /// 새 레코드 생성
    pub fn new(keys: Vec<String>, values: Vec<PackStreamValue>) -> Self {
        let key_index = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();

        Self {
            keys,
            values,
            key_index,
        }
    }

    /// RECORD 구조체에서 레코드 생성
    pub fn from_struct(keys: &[String], packed: &PackedStruct) -> BoltResult<Self> {
        if packed.signature() != Signature::Record.as_u8() || packed.len() != 1 {
            return Err(BoltError::protocol(format!(
                "expected RECORD with one field, found signature 0x{:02X} with {} fields",
                packed.signature(),
                packed.len()
            )));
        }
        match packed.fields().decode()? {
            PackStreamValue::List(values) => Ok(Self::new(keys.to_vec(), values)),
            other => Err(BoltError::protocol(format!(
                "RECORD field must be a list, found {}",
                other.type_name()
            ))),
        }
    }

    /// 키 목록
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// 값 목록
    pub fn values(&self) -> &[PackStreamValue] {
        &self.values
    }

    /// 레코드 길이
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 빈 레코드 여부
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 키로 값 가져오기
    pub fn get(&self, key: &str) -> Option<&PackStreamValue> {
        self.key_index.get(key).and_then(|&i| self.values.get(i))
    }

    /// 인덱스로 값 가져오기
    pub fn get_by_index(&self, index: usize) -> Option<&PackStreamValue> {
        self.values.get(index)
    }

    /// 레코드 안의 모든 구조체를 노드로 변환
    ///
    /// 구조체가 아닌 값은 건너뛰고, 노드가 아닌 구조체는 오류
    pub fn nodes<T>(&self) -> BoltResult<Vec<Node<T>>>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        self.values
            .iter()
            .filter_map(PackStreamValue::as_structure)
            .map(mapper::node_from_structure)
            .collect()
    }

    /// 키 존재 여부
    pub fn contains_key(&self, key: &str) -> bool {
        self.key_index.contains_key(key)
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a PackStreamValue);
    type IntoIter = std::iter::Zip<std::slice::Iter<'a, String>, std::slice::Iter<'a, PackStreamValue>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter().zip(self.values.iter())
    }
}
