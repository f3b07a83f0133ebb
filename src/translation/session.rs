//! 翻译会话（编排器）
//!
//! 一个会话持有一组有序的翻译单元（页），同一时刻最多只有一个活动的流式请求。
//! 单元按序翻译，上一单元的原文与译文作为下一单元请求的上下文。
//!
//! 取消是协作式的：每个请求持有一个 `CancellationToken`，消费循环在每次读取增量时
//! 与之竞争；所有写入都在会话锁内核对请求 id，被取代的请求永远不会再修改单元。

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::admission::AdmissionController;
use crate::translation::chunker::{chunk_text, count_words, needs_chunking, DEFAULT_CHUNK_WORDS};
use crate::translation::client::{CompletionClient, StreamRequest};
use crate::translation::config::constants::{DEFAULT_MIN_AUTO_TRANSLATE_WORDS, FAILURE_PLACEHOLDER};
use crate::translation::config::TranslationConfig;
use crate::translation::document::PageContent;
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::prompt::TranslationContext;

const EVENT_CAPACITY: usize = 1024;

/// 单元状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitStatus {
    Pending,
    Translating,
    Done,
    Failed,
    Cancelled,
}

/// 翻译单元
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub index: usize,
    pub source_text: String,
    pub translated_text: String,
    pub status: UnitStatus,
    pub error_message: Option<String>,
    #[serde(skip)]
    request_id: Option<u64>,
}

impl Unit {
    fn new(index: usize, source_text: impl Into<String>) -> Self {
        Self {
            index,
            source_text: source_text.into(),
            translated_text: String::new(),
            status: UnitStatus::Pending,
            error_message: None,
            request_id: None,
        }
    }

    /// 原文或译文是否有内容
    pub fn has_content(&self) -> bool {
        !self.source_text.trim().is_empty() || !self.translated_text.trim().is_empty()
    }

    fn clear_translation(&mut self) {
        self.translated_text.clear();
        self.status = UnitStatus::Pending;
        self.error_message = None;
        self.request_id = None;
    }
}

/// 会话事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    UnitStarted { index: usize },
    Delta { index: usize, delta: String },
    UnitFinished { index: usize, status: UnitStatus },
    UnitsChanged { len: usize },
}

/// 单个单元的翻译结果
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Done,
    Failed(TranslationError),
    Cancelled,
    /// 原文为空或索引越界，没有发出请求
    Skipped,
}

/// 编辑原文后的处理结果
#[derive(Debug)]
pub enum EditOutcome {
    /// 超长文本已分块，并排期了覆盖这些单元的顺序翻译
    Chunked(ScheduledRun),
    /// 已排期单元翻译
    Translating(ScheduledRun),
    /// 文本过短，译文已清空
    Cleared,
}

/// 已排期的顺序翻译
#[derive(Debug)]
pub struct ScheduledRun {
    indices: Vec<usize>,
    handle: JoinHandle<Vec<UnitOutcome>>,
}

impl ScheduledRun {
    /// 本次排期覆盖的单元索引（升序）
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// 等待排期完成
    pub async fn wait(self) -> Vec<UnitOutcome> {
        match self.handle.await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::error!("顺序翻译任务异常退出: {}", e);
                Vec::new()
            }
        }
    }

    /// 不再关心结果
    pub fn detach(self) {}
}

/// 会话配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub chunk_words: usize,
    pub min_auto_translate_words: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_words: DEFAULT_CHUNK_WORDS,
            min_auto_translate_words: DEFAULT_MIN_AUTO_TRANSLATE_WORDS,
        }
    }
}

impl From<&TranslationConfig> for SessionConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            chunk_words: config.chunk_words,
            min_auto_translate_words: config.min_auto_translate_words,
        }
    }
}

struct ActiveRequest {
    id: u64,
    token: CancellationToken,
}

struct SessionState {
    units: Vec<Unit>,
    target_lang: String,
    instructions: Option<String>,
    active: Option<ActiveRequest>,
}

impl SessionState {
    fn is_current(&self, id: u64) -> bool {
        self.active.as_ref().is_some_and(|active| active.id == id)
    }

    fn unit_owned_by(&mut self, id: u64) -> Option<&mut Unit> {
        self.units.iter_mut().find(|unit| unit.request_id == Some(id))
    }

    fn reindex(&mut self) {
        for (index, unit) in self.units.iter_mut().enumerate() {
            unit.index = index;
        }
    }
}

struct SessionAdmission {
    controller: AdmissionController,
    identity: String,
}

struct SessionInner {
    client: Arc<dyn CompletionClient>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    admission: Mutex<Option<SessionAdmission>>,
    next_request_id: AtomicU64,
    epoch: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

struct PreparedRequest {
    id: u64,
    token: CancellationToken,
    request: StreamRequest,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 每页对应的单元索引
fn placement(pages: &[PageContent], total_pages: usize) -> Vec<usize> {
    let cap = total_pages.max(pages.len());
    let mut seen = HashSet::with_capacity(pages.len());
    let by_number = pages
        .iter()
        .all(|page| (1..=cap).contains(&page.page_number) && seen.insert(page.page_number));

    if by_number {
        pages.iter().map(|page| page.page_number - 1).collect()
    } else {
        tracing::warn!("页码无效或重复，按顺序放置 {} 页", pages.len());
        (0..pages.len()).collect()
    }
}

/// 翻译会话
///
/// 克隆得到的是同一会话的句柄。排期类操作内部调用 `tokio::spawn`，必须在 tokio 运行时中使用。
#[derive(Clone)]
pub struct TranslationSession {
    inner: Arc<SessionInner>,
}

impl TranslationSession {
    /// 创建会话，初始包含一个空单元
    pub fn new(client: Arc<dyn CompletionClient>, target_lang: impl Into<String>, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                client,
                config,
                state: Mutex::new(SessionState {
                    units: vec![Unit::new(0, "")],
                    target_lang: target_lang.into(),
                    instructions: None,
                    active: None,
                }),
                admission: Mutex::new(None),
                next_request_id: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// 每个单元请求前先消耗一次 `identity` 的翻译配额
    pub fn with_admission(self, controller: AdmissionController, identity: impl Into<String>) -> Self {
        *lock(&self.inner.admission) = Some(SessionAdmission {
            controller,
            identity: identity.into(),
        });
        self
    }

    // ============================================================================
    // 查询
    // ============================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> SessionConfig {
        self.inner.config
    }

    /// 单元快照
    pub fn units(&self) -> Vec<Unit> {
        self.state().units.clone()
    }

    pub fn unit(&self, index: usize) -> Option<Unit> {
        self.state().units.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().units.is_empty()
    }

    pub fn target_lang(&self) -> String {
        self.state().target_lang.clone()
    }

    pub fn instructions(&self) -> Option<String> {
        self.state().instructions.clone()
    }

    /// 是否有进行中的请求
    pub fn is_translating(&self) -> bool {
        self.state().active.is_some()
    }

    /// 全部译文，页之间以空行分隔
    pub fn full_translation(&self) -> String {
        self.state()
            .units
            .iter()
            .map(|unit| unit.translated_text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    // ============================================================================
    // 单元翻译
    // ============================================================================

    /// 翻译单个单元并等待结束
    ///
    /// 会取消当前活动请求，并中止正在进行的顺序翻译。
    pub async fn translate_unit(&self, index: usize, override_lang: Option<&str>) -> TranslationResult<UnitOutcome> {
        self.ensure_index(index)?;
        self.begin_operation();
        Ok(self.run_unit(index, override_lang.map(str::to_string)).await)
    }

    /// 按升序依次翻译 `[start, start + count)`，范围按单元数截断
    ///
    /// 空白单元跳过；失败的单元记录后继续；一旦被更新的操作取代则停止。
    pub async fn translate_sequential(
        &self,
        start: usize,
        count: usize,
        override_lang: Option<&str>,
    ) -> Vec<UnitOutcome> {
        let epoch = self.begin_operation();
        let indices = self.clamped_range(start, count);
        self.run_indices(epoch, indices, override_lang.map(str::to_string))
            .await
    }

    /// 手动重译单个单元（不受自动翻译词数阈值限制）
    pub fn retranslate_unit(&self, index: usize) -> TranslationResult<ScheduledRun> {
        self.ensure_index(index)?;
        self.begin_operation();
        Ok(self.schedule(vec![index], None))
    }

    /// 清空全部译文后重新顺序翻译所有单元
    pub fn retranslate_all(&self) -> ScheduledRun {
        self.begin_operation();
        let len = {
            let mut state = self.state();
            self.cancel_active_locked(&mut state);
            state.units.iter_mut().for_each(Unit::clear_translation);
            state.units.len()
        };
        tracing::info!("重新翻译全部 {} 个单元", len);
        self.schedule((0..len).collect(), None)
    }

    /// 切换目标语言：取消活动请求，清空全部译文，然后顺序翻译所有有实质内容的单元
    pub fn change_target_language(&self, new_lang: impl Into<String>) -> ScheduledRun {
        let new_lang = new_lang.into();
        self.begin_operation();

        let indices = {
            let mut state = self.state();
            self.cancel_active_locked(&mut state);
            state.target_lang = new_lang.clone();
            state.units.iter_mut().for_each(Unit::clear_translation);
            state
                .units
                .iter()
                .filter(|unit| self.is_substantial(&unit.source_text))
                .map(|unit| unit.index)
                .collect::<Vec<_>>()
        };

        tracing::info!("目标语言切换为 {}，{} 个单元待翻译", new_lang, indices.len());
        self.emit(SessionEvent::UnitsChanged { len: self.len() });
        self.schedule(indices, None)
    }

    /// 取消活动请求并停止正在进行的顺序翻译
    pub fn cancel(&self) {
        self.begin_operation();
        let mut state = self.state();
        self.cancel_active_locked(&mut state);
    }

    pub fn set_instructions(&self, instructions: Option<String>) {
        self.state().instructions = instructions.filter(|text| !text.trim().is_empty());
    }

    // ============================================================================
    // 编辑
    // ============================================================================

    /// 超长文本分块，从 `start` 开始依次放入连续单元，并排期覆盖这些单元的顺序翻译
    pub fn ingest_long_text(&self, start: usize, raw: &str) -> ScheduledRun {
        let chunks = chunk_text(raw, self.inner.config.chunk_words);
        self.begin_operation();

        let len = {
            let mut state = self.state();
            self.cancel_active_locked(&mut state);

            let old_len = state.units.len();
            let needed = start + chunks.len();
            while state.units.len() < needed.max(start + 1) {
                let index = state.units.len();
                state.units.push(Unit::new(index, ""));
            }

            for (offset, chunk) in chunks.iter().enumerate() {
                let unit = &mut state.units[start + offset];
                unit.source_text = chunk.clone();
                unit.clear_translation();
            }

            // 清除原来位于新块之后的旧内容
            for index in needed..old_len {
                let unit = &mut state.units[index];
                unit.source_text.clear();
                unit.clear_translation();
            }

            state.units.len()
        };

        tracing::info!(
            "长文本已分为 {} 块，放入第 {} 到第 {} 页",
            chunks.len(),
            start + 1,
            start + chunks.len()
        );
        self.emit(SessionEvent::UnitsChanged { len });
        self.schedule((start..start + chunks.len()).collect(), None)
    }

    /// 编辑单元原文并按自动翻译策略处理
    pub fn edit_source(&self, index: usize, text: &str) -> TranslationResult<EditOutcome> {
        self.ensure_index(index)?;

        if needs_chunking(text, self.inner.config.chunk_words) {
            return Ok(EditOutcome::Chunked(self.ingest_long_text(index, text)));
        }

        self.begin_operation();
        let substantial = self.is_substantial(text);
        {
            let mut state = self.state();
            let owns_active = state.units.get(index).is_some_and(|unit| unit.request_id.is_some());
            if owns_active {
                self.cancel_active_locked(&mut state);
            }
            let Some(unit) = state.units.get_mut(index) else {
                return Err(TranslationError::InvalidInput(format!("page {} does not exist", index + 1)));
            };
            unit.source_text = text.to_string();
            if !substantial {
                unit.clear_translation();
            }
        }

        if substantial {
            Ok(EditOutcome::Translating(self.schedule(vec![index], None)))
        } else {
            Ok(EditOutcome::Cleared)
        }
    }

    /// 在末尾追加一个空单元，返回其索引
    pub fn add_page(&self) -> usize {
        let (index, len) = {
            let mut state = self.state();
            let index = state.units.len();
            state.units.push(Unit::new(index, ""));
            (index, state.units.len())
        };
        self.emit(SessionEvent::UnitsChanged { len });
        index
    }

    /// 清空单元的原文与译文
    pub fn erase_page(&self, index: usize) -> TranslationResult<()> {
        self.ensure_index(index)?;
        self.begin_operation();

        let mut state = self.state();
        if state.units.get(index).is_some_and(|unit| unit.request_id.is_some()) {
            self.cancel_active_locked(&mut state);
        }
        if let Some(unit) = state.units.get_mut(index) {
            unit.source_text.clear();
            unit.clear_translation();
        }
        Ok(())
    }

    /// 删除单元；有内容的单元拒绝删除
    pub fn remove_page(&self, index: usize) -> TranslationResult<()> {
        self.ensure_index(index)?;

        let len = {
            let mut state = self.state();
            if state.units[index].has_content() {
                return Err(TranslationError::InvalidInput(
                    "Please clear the content first using the erase button, then try deleting."
                        .to_string(),
                ));
            }
            state.units.remove(index);
            state.reindex();
            state.units.len()
        };

        self.begin_operation();
        self.emit(SessionEvent::UnitsChanged { len });
        Ok(())
    }

    /// 清空全部内容，只保留一个空单元
    pub fn clear_all(&self) {
        self.begin_operation();
        {
            let mut state = self.state();
            self.cancel_active_locked(&mut state);
            state.units = vec![Unit::new(0, "")];
        }
        self.emit(SessionEvent::UnitsChanged { len: 1 });
    }

    // ============================================================================
    // 文档载入
    // ============================================================================

    /// 载入单段文档内容：超长则分块，否则放入第一页
    pub fn load_document(&self, content: &str) -> Option<ScheduledRun> {
        if needs_chunking(content, self.inner.config.chunk_words) {
            return Some(self.ingest_long_text(0, content));
        }

        self.begin_operation();
        {
            let mut state = self.state();
            self.cancel_active_locked(&mut state);
            if state.units.is_empty() {
                state.units.push(Unit::new(0, ""));
            }
            let unit = &mut state.units[0];
            unit.source_text = content.to_string();
            unit.clear_translation();
        }

        if self.is_substantial(content) {
            Some(self.schedule(vec![0], None))
        } else {
            None
        }
    }

    /// 载入按页拆分的文档，按页码放置，并顺序翻译有实质内容的页
    ///
    /// 页码需在 `1..=max(total_pages, pages.len())` 内且互不重复，否则按给定顺序紧凑放置。
    pub fn load_pages(&self, pages: &[PageContent], total_pages: usize) -> Option<ScheduledRun> {
        self.begin_operation();

        let slots = placement(pages, total_pages);
        let needed = slots.iter().max().map_or(1, |last| last + 1);

        let (indices, len) = {
            let mut state = self.state();
            self.cancel_active_locked(&mut state);
            state.units = (0..needed).map(|index| Unit::new(index, "")).collect();

            let mut indices = Vec::new();
            for (page, &index) in pages.iter().zip(&slots) {
                state.units[index].source_text = page.content.clone();
                if self.is_substantial(&page.content) {
                    indices.push(index);
                }
            }
            indices.sort_unstable();
            indices.dedup();
            (indices, state.units.len())
        };

        tracing::info!("载入 {} 页文档，{} 页待翻译", pages.len(), indices.len());
        self.emit(SessionEvent::UnitsChanged { len });

        if indices.is_empty() {
            None
        } else {
            Some(self.schedule(indices, None))
        }
    }

    // ============================================================================
    // 内部实现
    // ============================================================================

    fn state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.inner.state)
    }

    fn emit(&self, event: SessionEvent) {
        // 没有订阅者时发送失败是正常的
        let _ = self.inner.events.send(event);
    }

    fn ensure_index(&self, index: usize) -> TranslationResult<()> {
        let len = self.len();
        if index < len {
            Ok(())
        } else {
            Err(TranslationError::InvalidInput(format!(
                "page {} does not exist ({} pages)",
                index + 1,
                len
            )))
        }
    }

    fn is_substantial(&self, text: &str) -> bool {
        count_words(text) > self.inner.config.min_auto_translate_words
    }

    fn clamped_range(&self, start: usize, count: usize) -> Vec<usize> {
        let end = start.saturating_add(count).min(self.len());
        (start..end).collect()
    }

    /// 开始一个新的用户级操作，使进行中的顺序翻译在下一个单元前停止
    fn begin_operation(&self) -> u64 {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    fn cancel_active_locked(&self, state: &mut SessionState) {
        let Some(active) = state.active.take() else {
            return;
        };

        active.token.cancel();
        tracing::debug!("取消请求 #{}", active.id);

        if let Some(unit) = state.unit_owned_by(active.id) {
            unit.request_id = None;
            unit.status = UnitStatus::Cancelled;
            let index = unit.index;
            self.emit(SessionEvent::UnitFinished {
                index,
                status: UnitStatus::Cancelled,
            });
        }
    }

    fn schedule(&self, indices: Vec<usize>, override_lang: Option<String>) -> ScheduledRun {
        let epoch = self.current_epoch();
        let session = self.clone();
        let scheduled = indices.clone();
        let handle = tokio::spawn(async move { session.run_indices(epoch, scheduled, override_lang).await });
        ScheduledRun { indices, handle }
    }

    async fn run_indices(&self, epoch: u64, indices: Vec<usize>, override_lang: Option<String>) -> Vec<UnitOutcome> {
        let mut outcomes = Vec::with_capacity(indices.len());

        for index in indices {
            if self.current_epoch() != epoch {
                tracing::debug!("更新的操作已开始，停止顺序翻译");
                break;
            }
            if index >= self.len() {
                break;
            }

            let outcome = self.run_unit(index, override_lang.clone()).await;
            match &outcome {
                UnitOutcome::Failed(e) => {
                    tracing::warn!("第 {} 页翻译失败，继续下一页: {}", index + 1, e);
                }
                UnitOutcome::Cancelled => {
                    outcomes.push(outcome);
                    break;
                }
                UnitOutcome::Done | UnitOutcome::Skipped => {}
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    fn begin_request(&self, index: usize, override_lang: Option<String>) -> Option<PreparedRequest> {
        let mut state = self.state();
        let unit = state.units.get(index)?;
        if unit.source_text.trim().is_empty() {
            return None;
        }
        let text = unit.source_text.clone();

        let context = index
            .checked_sub(1)
            .and_then(|previous| state.units.get(previous))
            .filter(|previous| {
                !previous.source_text.trim().is_empty()
                    && !previous.translated_text.trim().is_empty()
                    && previous.status != UnitStatus::Failed
            })
            .map(|previous| TranslationContext::new(&previous.source_text, &previous.translated_text));

        self.cancel_active_locked(&mut state);

        let id = self.inner.next_request_id.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        state.active = Some(ActiveRequest {
            id,
            token: token.clone(),
        });

        let target_lang = override_lang.unwrap_or_else(|| state.target_lang.clone());
        let instructions = state.instructions.clone();

        let unit = &mut state.units[index];
        unit.translated_text.clear();
        unit.error_message = None;
        unit.status = UnitStatus::Translating;
        unit.request_id = Some(id);

        tracing::info!(
            "开始翻译第 {} 页 (请求 #{}, 目标 {}, 上下文 {})",
            index + 1,
            id,
            target_lang,
            context.is_some()
        );
        self.emit(SessionEvent::UnitStarted { index });

        Some(PreparedRequest {
            id,
            token,
            request: StreamRequest::new(text, target_lang)
                .with_instructions(instructions)
                .with_context(context),
        })
    }

    fn check_admission(&self) -> Option<TranslationError> {
        let admission = lock(&self.inner.admission);
        let admission = admission.as_ref()?;
        let decision = admission.controller.check_and_consume(&admission.identity);
        if decision.allowed {
            None
        } else {
            Some(TranslationError::RateLimitExceeded {
                limit: admission.controller.options().max_requests(),
                reset_at: decision.reset_at,
            })
        }
    }

    async fn run_unit(&self, index: usize, override_lang: Option<String>) -> UnitOutcome {
        let Some(PreparedRequest { id, token, request }) = self.begin_request(index, override_lang) else {
            return UnitOutcome::Skipped;
        };

        if let Some(denied) = self.check_admission() {
            return self.finish_failed(id, denied);
        }

        let mut deltas = self.inner.client.stream_translate(request);

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return self.finish_cancelled(id),
                next = deltas.next() => next,
            };

            match next {
                Some(Ok(delta)) => {
                    if !self.apply_delta(id, delta) {
                        return self.finish_cancelled(id);
                    }
                }
                Some(Err(e)) if e.is_cancelled() => return self.finish_cancelled(id),
                Some(Err(e)) => return self.finish_failed(id, e),
                None => return self.finish_done(id),
            }
        }
    }

    fn apply_delta(&self, id: u64, delta: String) -> bool {
        let mut state = self.state();
        if !state.is_current(id) {
            return false;
        }
        let Some(unit) = state.unit_owned_by(id) else {
            return false;
        };

        unit.translated_text.push_str(&delta);
        let index = unit.index;
        self.emit(SessionEvent::Delta { index, delta });
        true
    }

    fn finish_cancelled(&self, id: u64) -> UnitOutcome {
        let mut state = self.state();
        if state.is_current(id) {
            state.active = None;
        }
        if let Some(unit) = state.unit_owned_by(id) {
            unit.request_id = None;
            unit.status = UnitStatus::Cancelled;
            let index = unit.index;
            self.emit(SessionEvent::UnitFinished {
                index,
                status: UnitStatus::Cancelled,
            });
        }
        tracing::debug!("请求 #{} 已取消", id);
        UnitOutcome::Cancelled
    }

    fn finish_done(&self, id: u64) -> UnitOutcome {
        let mut state = self.state();
        if !state.is_current(id) {
            drop(state);
            return self.finish_cancelled(id);
        }
        state.active = None;

        if let Some(unit) = state.unit_owned_by(id) {
            unit.request_id = None;
            unit.status = UnitStatus::Done;
            let index = unit.index;
            tracing::info!("第 {} 页翻译完成 ({} 字符)", index + 1, unit.translated_text.chars().count());
            self.emit(SessionEvent::UnitFinished {
                index,
                status: UnitStatus::Done,
            });
        }
        UnitOutcome::Done
    }

    fn finish_failed(&self, id: u64, error: TranslationError) -> UnitOutcome {
        let mut state = self.state();
        if !state.is_current(id) {
            drop(state);
            return self.finish_cancelled(id);
        }
        state.active = None;

        if let Some(unit) = state.unit_owned_by(id) {
            unit.request_id = None;
            unit.status = UnitStatus::Failed;
            unit.error_message = Some(error.user_message());
            unit.translated_text = FAILURE_PLACEHOLDER.to_string();
            let index = unit.index;
            helpers::log_error(format_args!("第 {} 页翻译失败", index + 1), &error);
            self.emit(SessionEvent::UnitFinished {
                index,
                status: UnitStatus::Failed,
            });
        }
        UnitOutcome::Failed(error)
    }
}

impl std::fmt::Debug for TranslationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("TranslationSession")
            .field("units", &state.units.len())
            .field("target_lang", &state.target_lang)
            .field("active", &state.active.as_ref().map(|active| active.id))
            .finish()
    }
}
