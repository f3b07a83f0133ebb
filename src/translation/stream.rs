//! 上游事件流解码
//!
//! 上游以 `text/event-stream` 返回增量结果：每行 `data: <json>`，`data: [DONE]` 表示结束。
//! 单行 JSON 解析失败只记录日志，不会中断整个流。

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use super::error::{TranslationError, TranslationResult};

/// 解码出的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// 一段非空增量文本
    Delta(String),
    /// 收到 `[DONE]`
    Done,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// 增量行解码器
///
/// 按字节缓冲，只在拿到完整一行后才做 UTF-8 解码，因此跨传输块切开的多字节字符也能正确还原。
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已经看到 `[DONE]`
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 送入一段传输数据，返回其中已完整的事件
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }

        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.decode_line(&line) {
                let done = event == SseEvent::Done;
                events.push(event);
                if done {
                    self.buffer.clear();
                    break;
                }
            }
        }
        events
    }

    /// 传输结束，冲刷末尾未以换行结束的一行
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if self.finished || self.buffer.is_empty() {
            self.buffer.clear();
            return Vec::new();
        }

        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line).into_iter().collect()
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<SseEvent> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);

        let data = line.strip_prefix("data:")?;
        let data = data.strip_prefix(' ').unwrap_or(data);

        if data.trim() == "[DONE]" {
            self.finished = true;
            return Some(SseEvent::Done);
        }

        if data.trim().is_empty() {
            return None;
        }

        match serde_json::from_str::<CompletionChunk>(data) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content)
                .filter(|content| !content.is_empty())
                .map(SseEvent::Delta),
            Err(e) => {
                let skew = TranslationError::ProtocolSkew(format!("{}: {}", e, data));
                tracing::debug!("跳过无法解析的事件行: {}", skew);
                None
            }
        }
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

impl<S> DecodeState<S> {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Delta(text) => self.pending.push_back(text),
                SseEvent::Done => {
                    self.done = true;
                    break;
                }
            }
        }
    }
}

/// 把字节流解码为增量文本流
///
/// 读取过程中的传输错误作为最后一项产出，之后流结束。
pub fn decode_event_stream<S, B, E>(body: S) -> impl Stream<Item = TranslationResult<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TranslationError> + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.pending.pop_front() {
                return Some((Ok(delta), state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.feed(chunk.as_ref());
                    state.absorb(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    let error: TranslationError = e.into();
                    tracing::error!("读取上游事件流失败: {}", error);
                    return Some((Err(error), state));
                }
                None => {
                    let events = state.decoder.finish();
                    state.absorb(events);
                    state.done = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_line(content: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_decodes_deltas_and_done() {
        let mut decoder = SseDecoder::new();
        let input = format!("{}{}data: [DONE]\n{}", delta_line("Hel"), delta_line("lo"), delta_line("late"));

        let events = decoder.feed(input.as_bytes());
        assert_eq!(
            events,
            vec![
                SseEvent::Delta("Hel".to_string()),
                SseEvent::Delta("lo".to_string()),
                SseEvent::Done
            ]
        );
        assert!(decoder.is_finished());
        assert!(decoder.feed(delta_line("more").as_bytes()).is_empty());
    }

    #[test]
    fn test_line_split_across_chunks_and_crlf() {
        let mut decoder = SseDecoder::new();
        let line = delta_line("안녕").replace('\n', "\r\n");
        let bytes = line.as_bytes();
        // 在多字节字符中间切开
        let cut = line.find("안").unwrap() + 1;

        assert!(decoder.feed(&bytes[..cut]).is_empty());
        assert_eq!(decoder.feed(&bytes[cut..]), vec![SseEvent::Delta("안녕".to_string())]);
    }

    #[test]
    fn test_malformed_and_irrelevant_lines_are_skipped() {
        let mut decoder = SseDecoder::new();
        let input = format!(
            ": keep-alive\nevent: message\ndata: {{not json\ndata: {}\n{}",
            serde_json::json!({"choices": [{"delta": {"role": "assistant"}}]}),
            delta_line("ok")
        );
        assert_eq!(decoder.feed(input.as_bytes()), vec![SseEvent::Delta("ok".to_string())]);
    }

    #[test]
    fn test_finish_flushes_trailing_line() {
        let mut decoder = SseDecoder::new();
        let line = delta_line("tail");
        assert!(decoder.feed(line.trim_end().as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec![SseEvent::Delta("tail".to_string())]);
    }

    #[tokio::test]
    async fn test_decode_event_stream_stops_at_done() {
        let chunks: Vec<Result<Vec<u8>, TranslationError>> = vec![
            Ok(delta_line("a").into_bytes()),
            Ok(format!("{}data: [DONE]\n", delta_line("b")).into_bytes()),
            Ok(delta_line("ignored").into_bytes()),
        ];
        let deltas: Vec<_> = decode_event_stream(stream::iter(chunks)).collect().await;
        assert_eq!(deltas, vec![Ok("a".to_string()), Ok("b".to_string())]);
    }

    #[tokio::test]
    async fn test_decode_event_stream_surfaces_transport_error_last() {
        let chunks: Vec<Result<Vec<u8>, TranslationError>> = vec![
            Ok(delta_line("partial").into_bytes()),
            Err(TranslationError::NetworkError("connection reset".to_string())),
            Ok(delta_line("never").into_bytes()),
        ];
        let items: Vec<_> = decode_event_stream(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok("partial".to_string()));
        assert!(matches!(items[1], Err(TranslationError::NetworkError(_))));
    }
}
