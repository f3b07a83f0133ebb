// 集成测试公共模块
//
// 提供可编排的假补全客户端和等待辅助函数

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;

use solar_translate::translation::{
    CompletionClient, DeltaStream, SessionConfig, StreamRequest, TranslationError,
    TranslationResult, TranslationSession, Unit, UnitStatus,
};

/// 假客户端对单次请求的应答
pub enum Reply {
    /// 依次产出这些增量后结束
    Deltas(Vec<String>),
    /// 产出一个错误后结束
    Fail(TranslationError),
    /// 由测试通过发送端逐项推送，发送端关闭时结束
    Gated(mpsc::UnboundedReceiver<TranslationResult<String>>),
}

/// 按先进先出顺序应答的补全客户端
///
/// 没有预设应答时回显 `"[<lang>] <text>"`。
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<StreamRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_deltas(&self, deltas: &[&str]) {
        self.push(Reply::Deltas(deltas.iter().map(|d| d.to_string()).collect()));
    }

    pub fn push_failure(&self, error: TranslationError) {
        self.push(Reply::Fail(error));
    }

    /// 预设一个受控应答，返回推送增量用的发送端
    pub fn push_gate(&self) -> mpsc::UnboundedSender<TranslationResult<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Reply::Gated(rx));
        tx
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// 已收到的请求
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl CompletionClient for ScriptedClient {
    fn stream_translate(&self, request: StreamRequest) -> DeltaStream {
        let echo = format!("[{}] {}", request.target_lang, request.text);
        self.requests.lock().unwrap().push(request);

        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Deltas(deltas)) => stream::iter(deltas.into_iter().map(Ok)).boxed(),
            Some(Reply::Fail(error)) => stream::iter(vec![Err(error)]).boxed(),
            Some(Reply::Gated(rx)) => {
                stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
                    .boxed()
            }
            None => stream::iter(vec![Ok(echo)]).boxed(),
        }
    }
}

/// 创建使用假客户端的会话
pub fn session_with(client: &Arc<ScriptedClient>, target_lang: &str) -> TranslationSession {
    TranslationSession::new(client.clone(), target_lang, SessionConfig::default())
}

/// 生成 `sentences` 句、每句 `words_per_sentence` 词的文本
pub fn sentences(sentences: usize, words_per_sentence: usize) -> String {
    (0..sentences)
        .map(|s| {
            let words: Vec<String> = (0..words_per_sentence)
                .map(|w| format!("s{}w{}", s, w))
                .collect();
            format!("{}.", words.join(" "))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 轮询等待条件成立
pub async fn wait_until<F>(session: &TranslationSession, mut condition: F)
where
    F: FnMut(&[Unit]) -> bool,
{
    for _ in 0..200 {
        if condition(&session.units()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached, units: {:?}", session.units());
}

/// 等待某个单元进入指定状态
pub async fn wait_for_status(session: &TranslationSession, index: usize, status: UnitStatus) {
    wait_until(session, |units| units.get(index).map(|u| u.status) == Some(status)).await;
}
