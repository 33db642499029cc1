//! Config - 연결 설정
//!
//! Bolt 연결의 프레이밍 한도, 핸드셰이크 제안, 인증 정보

use std::time::Duration;

use crate::bolt::codec::{ChunkCodec, DEFAULT_MAX_MESSAGE_SIZE, MAX_CHUNK_SIZE};
use crate::bolt::handshake::{BoltVersion, Handshake, MAX_PROPOSALS};
use crate::bolt::{AuthToken, BoltError, BoltResult};

// ============================================================================
// BoltConfig - 연결 설정
// ============================================================================

/// 연결 설정
#[derive(Debug, Clone, PartialEq)]
pub struct BoltConfig {
    /// 송신 청크 최대 크기 (1..=65535)
    pub max_chunk_size: usize,
    /// 재조립된 메시지 최대 크기
    pub max_message_size: usize,
    /// INIT 에 보내는 클라이언트 이름
    pub user_agent: String,
    /// 핸드셰이크 버전 제안 (선호 순서, 1~4개)
    pub versions: Vec<BoltVersion>,
    /// 인증 토큰
    pub auth: AuthToken,
    /// TCP 연결 타임아웃
    pub connection_timeout: Duration,
}

impl BoltConfig {
    /// 빌더 시작
    pub fn builder() -> BoltConfigBuilder {
        BoltConfigBuilder {
            config: Self::default(),
        }
    }

    /// 설정 검증
    pub fn validate(&self) -> BoltResult<()> {
        if self.max_chunk_size == 0 || self.max_chunk_size > MAX_CHUNK_SIZE {
            return Err(BoltError::validation(format!(
                "max_chunk_size must be between 1 and {}, got {}",
                MAX_CHUNK_SIZE, self.max_chunk_size
            )));
        }
        if self.max_message_size == 0 {
            return Err(BoltError::validation("max_message_size must be positive"));
        }
        if self.versions.is_empty() || self.versions.len() > MAX_PROPOSALS {
            return Err(BoltError::validation(format!(
                "between 1 and {} protocol versions must be proposed, got {}",
                MAX_PROPOSALS,
                self.versions.len()
            )));
        }
        Ok(())
    }

    /// 설정된 버전을 제안하는 핸드셰이크
    pub fn handshake(&self) -> BoltResult<Handshake> {
        Ok(Handshake::with_versions(self.versions.clone())?)
    }

    /// 설정된 한도의 청크 코덱
    pub fn chunk_codec(&self) -> BoltResult<ChunkCodec> {
        ChunkCodec::with_limits(self.max_chunk_size, self.max_message_size)
    }
}

impl Default for BoltConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: MAX_CHUNK_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            user_agent: format!("neo4j-binary/{}", env!("CARGO_PKG_VERSION")),
            versions: BoltVersion::ALL.to_vec(),
            auth: AuthToken::default(),
            connection_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// BoltConfigBuilder - 설정 빌더
// ============================================================================

/// 연결 설정 빌더
#[derive(Debug)]
pub struct BoltConfigBuilder {
    config: BoltConfig,
}

impl BoltConfigBuilder {
    /// 청크 크기 설정
    pub fn with_max_chunk_size(mut self, size: usize) -> Self {
        self.config.max_chunk_size = size;
        self
    }

    /// 메시지 크기 한도 설정
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// User Agent 설정
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// 버전 제안 설정
    pub fn with_versions(mut self, versions: Vec<BoltVersion>) -> Self {
        self.config.versions = versions;
        self
    }

    /// 인증 토큰 설정
    pub fn with_auth(mut self, auth: AuthToken) -> Self {
        self.config.auth = auth;
        self
    }

    /// 연결 타임아웃 설정
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// 빌드
    pub fn build(self) -> BoltResult<BoltConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BoltConfig::default();
        assert_eq!(config.max_chunk_size, 65_535);
        assert_eq!(config.max_message_size, 16 * 1024 * 1024);
        assert!(config.user_agent.starts_with("neo4j-binary/"));
        assert_eq!(config.versions, vec![BoltVersion::V1]);
        assert_eq!(config.auth.scheme, "none");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = BoltConfig::builder()
            .with_max_chunk_size(1024)
            .with_user_agent("app/2.0")
            .with_auth(AuthToken::basic("neo4j", "secret"))
            .with_connection_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.max_chunk_size, 1024);
        assert_eq!(config.user_agent, "app/2.0");
        assert_eq!(config.auth.principal.as_deref(), Some("neo4j"));
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.chunk_codec().unwrap().max_chunk_size(), 1024);
    }

    #[test]
    fn test_invalid_chunk_size() {
        for size in [0, 65_536] {
            let result = BoltConfig::builder().with_max_chunk_size(size).build();
            assert!(matches!(result, Err(BoltError::Validation(_))));
        }
    }

    #[test]
    fn test_invalid_message_size() {
        let result = BoltConfig::builder().with_max_message_size(0).build();
        assert!(matches!(result, Err(BoltError::Validation(_))));
    }

    #[test]
    fn test_invalid_versions() {
        let result = BoltConfig::builder().with_versions(vec![]).build();
        assert!(matches!(result, Err(BoltError::Validation(_))));

        let result = BoltConfig::builder()
            .with_versions(vec![BoltVersion::V1; 5])
            .build();
        assert!(matches!(result, Err(BoltError::Validation(_))));
    }
}
