//! 指标描述模块
//!
//! 基于 metrics crate 定义规则评估相关的指标。指标的导出由宿主进程
//! 安装 recorder 负责，本模块只登记名称和说明。

/// 规则集评估次数，按结果标签区分
pub const RULE_EVALUATIONS_TOTAL: &str = "rule_evaluations_total";
/// 规则集评估耗时
pub const RULE_EVALUATION_DURATION_SECONDS: &str = "rule_evaluation_duration_seconds";
/// 叶子规则失败次数，按错误码标签区分
pub const RULE_BRANCH_FAILURES_TOTAL: &str = "rule_branch_failures_total";
/// 扫描策略读取的页数
pub const RULE_PAGES_READ_TOTAL: &str = "rule_pages_read_total";
/// 下推到存储的存在性查询次数
pub const RULE_PUSHDOWN_QUERIES_TOTAL: &str = "rule_pushdown_queries_total";

/// 登记指标说明
pub fn register(service_name: &str) {
    metrics::describe_counter!(RULE_EVALUATIONS_TOTAL, "Total number of rule set evaluations");
    metrics::describe_histogram!(
        RULE_EVALUATION_DURATION_SECONDS,
        "Rule set evaluation duration in seconds"
    );
    metrics::describe_counter!(
        RULE_BRANCH_FAILURES_TOTAL,
        "Total number of rule branches degraded to unsatisfied"
    );
    metrics::describe_counter!(RULE_PAGES_READ_TOTAL, "Total number of candidate pages read");
    metrics::describe_counter!(
        RULE_PUSHDOWN_QUERIES_TOTAL,
        "Total number of set-membership queries pushed to the store"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}
