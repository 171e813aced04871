//! 技能清单
//!
//! 技能运行时（OpenClaw 等）按名称注册本适配器；`skyagent-dispatch --manifest` 输出此清单。

use serde::Serialize;

/// 技能元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillManifest {
    pub name: &'static str,
    pub description: &'static str,
    pub version: &'static str,
}

pub const MANIFEST: SkillManifest = SkillManifest {
    name: "skyagentos_orchestrator_trigger",
    description: "Trigger SkyAgentOS orchestrator API from OpenClaw events",
    version: "2.0.0",
};

impl SkillManifest {
    /// 简短描述，格式同技能列表
    pub fn summary(&self) -> String {
        format!("[{}] v{}: {}", self.name, self.version, self.description)
    }
}
