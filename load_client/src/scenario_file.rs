use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::behavior::{
    BehaviorDefinition, HttpMethod, HttpRequest, UserBehavior, WaitTime, WeightedTask,
};

fn default_method() -> HttpMethod {
    HttpMethod::Get
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskEntry {
    pub name: String,
    pub weight: u32,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

/// TOML로 적은 사용자 행동 정의
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    pub name: String,
    pub wait_time: WaitTime,
    pub tasks: Vec<TaskEntry>,
}

impl ScenarioFile {
    pub fn from_toml_str(s: &str) -> Result<BehaviorDefinition> {
        let file: ScenarioFile = toml::from_str(s)?;
        let definition = file.into_definition();
        definition.validate()?;
        Ok(definition)
    }

    pub fn from_path(path: &Path) -> Result<BehaviorDefinition> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing scenario file {}", path.display()))
    }

    fn into_definition(self) -> BehaviorDefinition {
        let tasks = self
            .tasks
            .into_iter()
            .map(|t| {
                let request = t
                    .query
                    .into_iter()
                    .fold(HttpRequest::new(t.method, t.path), |req, (k, v)| req.query(k, v));
                WeightedTask::new(t.name, t.weight, request)
            })
            .collect();
        BehaviorDefinition {
            name: self.name,
            wait_time: self.wait_time,
            tasks,
        }
    }
}

/// 파일에서 읽은 정의를 그대로 돌리는 사용자. on_start는 no-op
#[derive(Debug, Clone)]
pub struct FileUser {
    definition: BehaviorDefinition,
}

impl FileUser {
    pub fn new(definition: BehaviorDefinition) -> Self {
        Self { definition }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(ScenarioFile::from_path(path)?))
    }
}

#[async_trait]
impl UserBehavior for FileUser {
    fn definition(&self) -> &BehaviorDefinition {
        &self.definition
    }

    fn clone_trait(&self) -> Box<dyn UserBehavior> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::SimpleWebUser;

    const SIMPLE_WEB: &str = include_str!("../configs/simple_web_scenario.toml");

    #[test]
    fn bundled_scenario_matches_builtin_user() {
        let from_file = ScenarioFile::from_toml_str(SIMPLE_WEB).unwrap();
        assert_eq!(&from_file, SimpleWebUser::new().definition());
    }

    #[test]
    fn method_defaults_to_get_and_query_is_optional() {
        let def = ScenarioFile::from_toml_str(
            r#"
            name = "Api"
            wait_time = { min_secs = 0.5, max_secs = 0.5 }

            [[tasks]]
            name = "list"
            weight = 2
            path = "/pets"

            [[tasks]]
            name = "create"
            weight = 1
            method = "POST"
            path = "/pets"
            "#,
        )
        .unwrap();
        assert_eq!(def.tasks[0].request.method, HttpMethod::Get);
        assert!(def.tasks[0].request.query.is_empty());
        assert_eq!(def.tasks[1].request.method, HttpMethod::Post);
    }

    #[test]
    fn rejects_unknown_method_and_zero_weight() {
        let bad_method = r#"
            name = "x"
            wait_time = { min_secs = 0.0, max_secs = 1.0 }
            [[tasks]]
            name = "a"
            weight = 1
            method = "TRACE"
            path = "/"
        "#;
        assert!(ScenarioFile::from_toml_str(bad_method).is_err());

        let zero_weight = r#"
            name = "x"
            wait_time = { min_secs = 0.0, max_secs = 1.0 }
            [[tasks]]
            name = "a"
            weight = 0
            path = "/"
        "#;
        let err = ScenarioFile::from_toml_str(zero_weight).unwrap_err();
        assert!(err.to_string().contains("weight 0"), "{}", err);
    }
}
