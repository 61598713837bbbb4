/// 공유 유틸리티 모듈
/// Shared Utilities Module
///
/// 역할:
/// - 캐시/락/큐 키 생성 (key_builder)
/// - 금액 단위 변환 (money: 최소 단위 i64 <-> DB NUMERIC)
pub mod key_builder;
pub mod money;
