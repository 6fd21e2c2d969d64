//! Cohere stream decoder
//!
//! Cohere's chat stream is not SSE: every line is a JSON record with an
//! `event_type` discriminator and an `is_finished` flag.

use super::wire::{
    CitationGeneration, CohereExtensions, CohereUsage, SearchQueriesGeneration, SearchResultsEvent,
    StreamEnd, StreamEnvelope, StreamEventType, StreamStart, TextGeneration,
    ToolCallsGeneration, canonical_arguments, map_finish_reason, parse_record,
};
use crate::stream::{LineDecoder, Step, StreamAccumulator, ToolCallIds};
use crate::{ChatResult, LLMError, ToolCall};
use tracing::{debug, trace};

/// Interprets Cohere stream records
#[derive(Debug, Default)]
pub struct CohereStreamDecoder {
    ids: ToolCallIds,
    surface_extensions: bool,
}

impl CohereStreamDecoder {
    /// Create a decoder; `surface_extensions` yields retrieval metadata increments
    pub fn new(surface_extensions: bool) -> Self {
        Self {
            ids: ToolCallIds::default(),
            surface_extensions,
        }
    }

    fn tool_calls(&mut self, data: ToolCallsGeneration) -> Vec<ChatResult> {
        if data.tool_calls.is_empty() {
            return Vec::new();
        }

        let calls = data
            .tool_calls
            .into_iter()
            .map(|call| {
                // Cohere usually omits ids
                let id = match call.id {
                    Some(id) if !id.is_empty() => id,
                    _ => self.ids.mint(&call.name),
                };
                ToolCall::function(id, call.name, canonical_arguments(call.parameters))
            })
            .collect();

        vec![ChatResult::tool_calls(calls)]
    }

    fn extension(&self, event: StreamEventType, line: &str) -> Result<Vec<ChatResult>, LLMError> {
        let ext = match event {
            StreamEventType::SearchQueriesGeneration => CohereExtensions {
                search_queries: parse_record::<SearchQueriesGeneration>(line)?.search_queries,
                ..CohereExtensions::default()
            },
            StreamEventType::SearchResults => CohereExtensions {
                search_results: parse_record::<SearchResultsEvent>(line)?.search_results,
                ..CohereExtensions::default()
            },
            StreamEventType::CitationGeneration => CohereExtensions {
                citations: parse_record::<CitationGeneration>(line)?.citations,
                ..CohereExtensions::default()
            },
            _ => return Ok(Vec::new()),
        };

        if self.surface_extensions {
            Ok(vec![ext.into_result()])
        } else {
            trace!(?event, "Suppressing Cohere retrieval metadata");
            Ok(Vec::new())
        }
    }

    fn dispatch(
        &mut self,
        event: StreamEventType,
        line: &str,
        acc: &mut StreamAccumulator,
    ) -> Result<Vec<ChatResult>, LLMError> {
        match event {
            StreamEventType::TextGeneration => {
                let data: TextGeneration = parse_record(line)?;
                acc.push_text(&data.text);
                Ok(vec![ChatResult::text_delta(data.text)])
            }
            StreamEventType::StreamStart => {
                if let Some(id) = parse_record::<StreamStart>(line)?.generation_id {
                    acc.set_id(id);
                }
                Ok(Vec::new())
            }
            StreamEventType::ToolCallsGeneration => Ok(self.tool_calls(parse_record(line)?)),
            StreamEventType::StreamEnd => {
                let end: StreamEnd = parse_record(line)?;
                let response = end.response;
                let reason = end.finish_reason.or_else(|| {
                    response.as_ref().and_then(|r| r.finish_reason.clone())
                });
                if let Some(reason) = reason {
                    acc.set_finish_reason(map_finish_reason(&reason));
                }
                if let Some(usage) = response
                    .as_ref()
                    .and_then(|r| r.usage.as_ref())
                    .and_then(CohereUsage::to_usage)
                {
                    acc.set_usage(usage);
                }
                Ok(Vec::new())
            }
            StreamEventType::SearchQueriesGeneration
            | StreamEventType::SearchResults
            | StreamEventType::CitationGeneration => self.extension(event, line),
        }
    }
}

impl LineDecoder for CohereStreamDecoder {
    fn decode_line(&mut self, line: &str, acc: &mut StreamAccumulator) -> Step {
        let envelope: StreamEnvelope = match parse_record(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("Skipping unparseable Cohere record: {e}");
                return Step::skip();
            }
        };

        let Some(event) = StreamEventType::parse(&envelope.event_type) else {
            debug!(event_type = %envelope.event_type, "Skipping unknown Cohere event");
            return Step::skip();
        };

        let results = self.dispatch(event, line, acc).unwrap_or_else(|e| {
            debug!(?event, "Skipping Cohere record: {e}");
            Vec::new()
        });

        if event == StreamEventType::StreamEnd || envelope.is_finished {
            Step::Finish(results)
        } else {
            Step::Continue(results)
        }
    }
}
