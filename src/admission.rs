//! 请求准入控制
//!
//! 按客户端标识做固定窗口计数。每个动作（翻译、上传）各持有一张独立的表，
//! 过期条目在下一次查询同一标识时惰性清除，没有后台清理任务。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::header::HeaderMap;

use crate::env::{rate_limit, EnvResult, EnvVar};

/// 固定窗口参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOptions {
    window: Duration,
    max_requests: u32,
}

impl RateLimitOptions {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests: max_requests.max(1),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 窗口内允许的请求数，至少为 1
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// 每小时 `max_requests` 次
    pub fn per_hour(max_requests: u32) -> Self {
        Self::new(Duration::from_secs(3600), max_requests)
    }

    fn window_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::hours(1))
    }
}

/// 单个标识在当前窗口内的计数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

/// 一次准入判定的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// 计数表
///
/// 每次读改写都在该键所在分片的锁内完成，不同标识之间不存在全局锁竞争。
#[derive(Debug, Default)]
pub struct RateLimitStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 对 `identity` 原子地执行一次计数
    fn consume(&self, identity: &str, now: DateTime<Utc>, options: &RateLimitOptions) -> AdmissionDecision {
        let fresh = RateLimitEntry {
            count: 1,
            reset_at: now + options.window_delta(),
        };
        let allow_fresh = AdmissionDecision {
            allowed: true,
            remaining: options.max_requests.saturating_sub(1),
            reset_at: fresh.reset_at,
        };

        match self.entries.entry(identity.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                allow_fresh
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();

                if now >= entry.reset_at {
                    *entry = fresh;
                    return allow_fresh;
                }

                if entry.count >= options.max_requests {
                    return AdmissionDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at: entry.reset_at,
                    };
                }

                entry.count += 1;
                AdmissionDecision {
                    allowed: true,
                    remaining: options.max_requests.saturating_sub(entry.count),
                    reset_at: entry.reset_at,
                }
            }
        }
    }

    pub fn get(&self, identity: &str) -> Option<RateLimitEntry> {
        self.entries.get(identity).map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 准入控制器
#[derive(Debug, Clone)]
pub struct AdmissionController {
    options: RateLimitOptions,
    store: Arc<RateLimitStore>,
}

impl AdmissionController {
    pub fn new(options: RateLimitOptions, store: Arc<RateLimitStore>) -> Self {
        Self { options, store }
    }

    /// 使用独立的新表创建
    pub fn with_options(options: RateLimitOptions) -> Self {
        Self::new(options, Arc::new(RateLimitStore::new()))
    }

    pub fn options(&self) -> RateLimitOptions {
        self.options
    }

    pub fn store(&self) -> &Arc<RateLimitStore> {
        &self.store
    }

    /// 检查并消耗一次配额
    pub fn check_and_consume(&self, identity: &str) -> AdmissionDecision {
        self.check_and_consume_at(identity, Utc::now())
    }

    /// 以给定时刻检查并消耗一次配额
    pub fn check_and_consume_at(&self, identity: &str, now: DateTime<Utc>) -> AdmissionDecision {
        let decision = self.store.consume(identity, now, &self.options);

        if decision.allowed {
            tracing::debug!("准入通过: {} (剩余 {})", identity, decision.remaining);
        } else {
            tracing::warn!(
                "准入拒绝: {} 已达到上限 {}，重置时间 {}",
                identity,
                self.options.max_requests,
                decision.reset_at
            );
        }

        decision
    }
}

/// 翻译与上传两类动作的限流器
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub translate: AdmissionController,
    pub upload: AdmissionController,
}

impl RateLimits {
    pub fn new(translate: RateLimitOptions, upload: RateLimitOptions) -> Self {
        Self {
            translate: AdmissionController::with_options(translate),
            upload: AdmissionController::with_options(upload),
        }
    }

    /// 从环境变量构建
    pub fn from_env() -> EnvResult<Self> {
        let window = rate_limit::Window::get()?;
        Ok(Self::new(
            RateLimitOptions::new(window, rate_limit::TranslateLimit::get()?),
            RateLimitOptions::new(window, rate_limit::UploadLimit::get()?),
        ))
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new(RateLimitOptions::per_hour(160), RateLimitOptions::per_hour(40))
    }
}

/// 从请求头推断客户端标识
///
/// 优先 `x-forwarded-for` 的第一项，其次 `x-real-ip`，都没有时为 `"unknown"`。
pub fn client_identity(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next().map(str::trim) {
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    "unknown".to_string()
}
