//! 触发事件与任务（Mission）
//!
//! TriggerEvent 由技能运行时产生，所有字段都可能缺失；Mission::from_trigger 按固定默认值
//! 归一化，从不失败。同一个 Mission 既能序列化为 HTTP 请求体，也能展开为子进程环境变量。

use serde::{Deserialize, Deserializer, Serialize};

/// 缺省任务目标
pub const DEFAULT_OBJECTIVE: &str = "Run default SkyAgentOS mission";
/// 缺省触发渠道
pub const DEFAULT_CHANNEL: &str = "unknown";

/// 本地进程读取的环境变量名
pub const OBJECTIVE_ENV: &str = "SKYAGENT_OBJECTIVE";
pub const CHANNEL_ENV: &str = "OPENCLAW_TRIGGER_CHANNEL";

/// 技能运行时传入的触发事件（WhatsApp / Telegram 消息等）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerEvent {
    #[serde(default)]
    pub message: Option<TriggerMessage>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub user: Option<TriggerUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerMessage {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerUser {
    /// Telegram 等平台给出数字 ID，统一转成字符串
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
}

impl TriggerEvent {
    /// 便捷构造：文本 + 渠道 + 用户
    pub fn new(
        text: impl Into<String>,
        channel: impl Into<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            message: Some(TriggerMessage {
                text: Some(text.into()),
            }),
            channel: Some(channel.into()),
            user: user_id.map(|id| TriggerUser { id: Some(id) }),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(serde_json::Number),
    }

    // 数值 0 与空串一样视为缺失
    Ok(Option::<Raw>::deserialize(deserializer)?.and_then(|raw| match raw {
        Raw::Str(s) => Some(s),
        Raw::Num(n) if n.as_f64() == Some(0.0) => None,
        Raw::Num(n) => Some(n.to_string()),
    }))
}

/// 归一化后的任务（即 HTTP 请求体）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mission {
    pub objective: String,
    pub metadata: MissionMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionMetadata {
    pub trigger_channel: String,
    pub user_id: Option<String>,
}

impl Mission {
    /// 按默认值规则从触发事件构建任务
    pub fn from_trigger(event: &TriggerEvent) -> Self {
        let objective = event
            .message
            .as_ref()
            .and_then(|m| non_empty(m.text.as_deref()))
            .unwrap_or(DEFAULT_OBJECTIVE)
            .to_string();
        let trigger_channel = non_empty(event.channel.as_deref())
            .unwrap_or(DEFAULT_CHANNEL)
            .to_string();
        let user_id = non_empty(event.user.as_ref().and_then(|u| u.id.as_deref()))
            .map(String::from);

        Self {
            objective,
            metadata: MissionMetadata {
                trigger_channel,
                user_id,
            },
        }
    }

    pub fn channel(&self) -> &str {
        &self.metadata.trigger_channel
    }

    /// 本地进程形式：叠加到继承环境之上的变量
    pub fn env_overlay(&self) -> Vec<(String, String)> {
        vec![
            (OBJECTIVE_ENV.to_string(), self.objective.clone()),
            (CHANNEL_ENV.to_string(), self.metadata.trigger_channel.clone()),
        ]
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> TriggerEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_event_uses_defaults() {
        let mission = Mission::from_trigger(&TriggerEvent::default());
        assert_eq!(mission.objective, DEFAULT_OBJECTIVE);
        assert_eq!(mission.channel(), DEFAULT_CHANNEL);
        assert_eq!(mission.metadata.user_id, None);
    }

    #[test]
    fn test_empty_text_falls_back_to_default_objective() {
        let event = parse(json!({ "message": { "text": "" }, "channel": "telegram" }));
        let mission = Mission::from_trigger(&event);
        assert_eq!(mission.objective, DEFAULT_OBJECTIVE);
        assert_eq!(mission.channel(), "telegram");
    }

    #[test]
    fn test_whitespace_text_is_kept_verbatim() {
        for text in ["  ", "\n"] {
            let event = parse(json!({ "message": { "text": text } }));
            let mission = Mission::from_trigger(&event);
            assert_eq!(mission.objective, text);
        }
    }

    #[test]
    fn test_full_event_is_carried_verbatim() {
        let event = parse(json!({
            "message": { "text": "Summarise GPU prices" },
            "channel": "whatsapp",
            "user": { "id": "u-42" }
        }));
        let mission = Mission::from_trigger(&event);
        assert_eq!(mission.objective, "Summarise GPU prices");
        assert_eq!(mission.channel(), "whatsapp");
        assert_eq!(mission.metadata.user_id.as_deref(), Some("u-42"));
    }

    #[test]
    fn test_empty_channel_and_user_id_are_treated_as_missing() {
        let event = parse(json!({ "channel": "", "user": { "id": "" } }));
        let mission = Mission::from_trigger(&event);
        assert_eq!(mission.channel(), DEFAULT_CHANNEL);
        assert_eq!(mission.metadata.user_id, None);
    }

    #[test]
    fn test_numeric_user_id_is_stringified() {
        let event = parse(json!({ "user": { "id": 123456789 } }));
        let mission = Mission::from_trigger(&event);
        assert_eq!(mission.metadata.user_id.as_deref(), Some("123456789"));
    }

    #[test]
    fn test_numeric_zero_user_id_is_treated_as_missing() {
        for id in [json!(0), json!(0.0)] {
            let event = parse(json!({ "user": { "id": id } }));
            let mission = Mission::from_trigger(&event);
            assert_eq!(mission.metadata.user_id, None);
        }
        let event = parse(json!({ "user": { "id": "0" } }));
        assert_eq!(Mission::from_trigger(&event).metadata.user_id.as_deref(), Some("0"));
    }

    #[test]
    fn test_null_fields_and_unknown_keys_are_accepted() {
        let event = parse(json!({
            "message": null,
            "channel": null,
            "user": { "id": null, "name": "ignored" },
            "extra": true
        }));
        let mission = Mission::from_trigger(&event);
        assert_eq!(mission.objective, DEFAULT_OBJECTIVE);
        assert_eq!(mission.metadata.user_id, None);
    }

    #[test]
    fn test_wire_form_serializes_null_user_id() {
        let mission = Mission::from_trigger(&TriggerEvent::new("go", "cli", None));
        let body = serde_json::to_value(&mission).unwrap();
        assert_eq!(
            body,
            json!({
                "objective": "go",
                "metadata": { "trigger_channel": "cli", "user_id": null }
            })
        );
    }

    #[test]
    fn test_env_overlay() {
        let mission = Mission::from_trigger(&TriggerEvent::new("go", "cli", None));
        let env = mission.env_overlay();
        assert!(env.contains(&(OBJECTIVE_ENV.to_string(), "go".to_string())));
        assert!(env.contains(&(CHANNEL_ENV.to_string(), "cli".to_string())));
    }
}
