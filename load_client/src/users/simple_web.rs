use async_trait::async_trait;
use tracing::debug;

use crate::behavior::{
    BehaviorDefinition, HttpRequest, UserBehavior, UserContext, WaitTime, WeightedTask,
};
use crate::TaskResult;

pub const HOME_PATH: &str = "/";
// 이름은 health check지만 실제로는 검색 엔드포인트를 친다
pub const SEARCH_PATH: &str = "/arama";
pub const SEARCH_QUERY: (&str, &str) = ("q", "selam");

/// 홈 페이지(`GET /`)와 검색(`GET /arama?q=selam`)을 3:1로 호출하는 사용자.
/// 요청 사이에 1~5초 쉰다.
#[derive(Debug, Clone)]
pub struct SimpleWebUser {
    definition: BehaviorDefinition,
}

impl Default for SimpleWebUser {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleWebUser {
    pub fn new() -> Self {
        Self {
            definition: BehaviorDefinition {
                name: "SimpleWebUser".to_string(),
                wait_time: WaitTime::between(1.0, 5.0),
                tasks: vec![
                    WeightedTask::new("load_home_page", 3, HttpRequest::get(HOME_PATH)),
                    WeightedTask::new(
                        "check_health",
                        1,
                        HttpRequest::get(SEARCH_PATH).query(SEARCH_QUERY.0, SEARCH_QUERY.1),
                    ),
                ],
            },
        }
    }

    /// 테스트에서 대기 시간을 줄일 때 사용
    pub fn with_wait_time(mut self, wait_time: WaitTime) -> Self {
        self.definition.wait_time = wait_time;
        self
    }
}

#[async_trait]
impl UserBehavior for SimpleWebUser {
    fn definition(&self) -> &BehaviorDefinition {
        &self.definition
    }

    async fn on_start(&self, user: &UserContext) -> TaskResult {
        // 로그인 같은 사전 작업이 필요하면 여기서 user.client.send(..) 로 보낸다
        debug!("[{}] SimpleWebUser on_start (no-op)", user.user_id);
        Ok(())
    }

    fn clone_trait(&self) -> Box<dyn UserBehavior> {
        Box::new(self.clone())
    }
}
