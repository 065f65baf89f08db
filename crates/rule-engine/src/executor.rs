//! 规则集执行器
//!
//! 对规则集做短路求值，返回匹配结果和评估追踪信息。
//!
//! - AND：遇到第一个不满足的子节点立即返回 false，无子节点时为 true
//! - OR：遇到第一个满足的子节点立即返回 true，无子节点时为 false
//!
//! 分支级错误（取值形态不符、上下文缺数据、未知描述符等）只让所在分支不满足，
//! 记录到结果的 `failures` 中；存储故障直接返回给调用方，不做重试。

use futures::future::{self, AbortHandle, BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use storefront_shared::config::{BranchMode, CancellationPolicy, RuleEngineConfig};
use storefront_shared::observability::metrics::{
    RULE_BRANCH_FAILURES_TOTAL, RULE_EVALUATION_DURATION_SECONDS, RULE_EVALUATIONS_TOTAL,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::context::CartRuleContext;
use crate::error::{Result, RuleError};
use crate::models::{BranchFailure, EvaluationResult, RuleExpression, RuleNode, RuleSet};
use crate::rules::RuleRegistry;

/// 执行选项
#[derive(Debug, Clone, Default)]
pub struct ExecutorOptions {
    pub branch_mode: BranchMode,
    pub cancellation_policy: CancellationPolicy,
    /// 单次评估的总预算
    pub timeout: Option<Duration>,
    pub trace_enabled: bool,
}

impl From<&RuleEngineConfig> for ExecutorOptions {
    fn from(config: &RuleEngineConfig) -> Self {
        Self {
            branch_mode: config.branch_mode,
            cancellation_policy: config.cancellation_policy,
            timeout: config.evaluation_timeout(),
            trace_enabled: config.trace_enabled,
        }
    }
}

/// 单次评估共享的只读状态
struct Scope<'a> {
    ctx: &'a CartRuleContext,
    token: &'a CancellationToken,
    deadline: Option<tokio::time::Instant>,
}

impl Scope<'_> {
    /// 在显式取消或超出预算时完成
    async fn interrupted(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

/// 节点评估报告，父节点按子节点下标顺序合并
#[derive(Debug, Default)]
struct NodeReport {
    matched: bool,
    cancelled: bool,
    matched_expressions: Vec<String>,
    failures: Vec<BranchFailure>,
    trace: Vec<String>,
}

impl NodeReport {
    fn absorb(&mut self, child: NodeReport) {
        self.cancelled |= child.cancelled;
        self.matched_expressions.extend(child.matched_expressions);
        self.failures.extend(child.failures);
        self.trace.extend(child.trace);
    }
}

/// 规则集执行器
pub struct RuleSetExecutor {
    registry: Arc<RuleRegistry>,
    options: ExecutorOptions,
}

impl RuleSetExecutor {
    pub fn new(registry: Arc<RuleRegistry>, options: ExecutorOptions) -> Self {
        Self { registry, options }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.options.trace_enabled = true;
        self
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// 执行规则集评估
    pub async fn execute(
        &self,
        rule_set: &RuleSet,
        ctx: &CartRuleContext,
    ) -> Result<EvaluationResult> {
        self.execute_with_cancellation(rule_set, ctx, CancellationToken::new())
            .await
    }

    /// 执行规则集评估，`token` 被取消后尚未完成的叶子按取消策略取值
    #[instrument(skip_all, fields(rule_set_id = %rule_set.id, rule_set_name = %rule_set.name))]
    pub async fn execute_with_cancellation(
        &self,
        rule_set: &RuleSet,
        ctx: &CartRuleContext,
        token: CancellationToken,
    ) -> Result<EvaluationResult> {
        let start = Instant::now();
        let scope = Scope {
            ctx,
            token: &token,
            deadline: self
                .options
                .timeout
                .map(|t| tokio::time::Instant::now() + t),
        };

        let outcome = self.evaluate_group(rule_set, &scope, "root".to_string()).await;
        let elapsed = start.elapsed();
        metrics::histogram!(RULE_EVALUATION_DURATION_SECONDS).record(elapsed.as_secs_f64());

        let report = match outcome {
            Ok(report) => report,
            Err(e) => {
                metrics::counter!(RULE_EVALUATIONS_TOTAL, "result" => "error").increment(1);
                error!(error = %e, code = e.code(), "规则集评估失败");
                return Err(e);
            }
        };

        let mut result = EvaluationResult::new(rule_set.id.clone(), rule_set.name.clone());
        result.matched = report.matched;
        result.cancelled = report.cancelled;
        result.matched_expressions = report.matched_expressions;
        result.failures = report.failures;
        result.evaluation_trace = report.trace;
        result.evaluation_time_ms = elapsed.as_millis() as i64;

        let label = if result.cancelled {
            "cancelled"
        } else if result.matched {
            "matched"
        } else {
            "not_matched"
        };
        metrics::counter!(RULE_EVALUATIONS_TOTAL, "result" => label).increment(1);

        debug!(
            matched = result.matched,
            cancelled = result.cancelled,
            failures = result.failures.len(),
            elapsed_ms = result.evaluation_time_ms,
            "规则集评估完成"
        );

        Ok(result)
    }

    /// 规则集是否匹配
    ///
    /// 评估被取消或超时时返回 `Err(Cancelled)`，由调用方决定如何处理。
    pub async fn is_match(&self, rule_set: &RuleSet, ctx: &CartRuleContext) -> Result<bool> {
        self.is_match_with_cancellation(rule_set, ctx, CancellationToken::new())
            .await
    }

    pub async fn is_match_with_cancellation(
        &self,
        rule_set: &RuleSet,
        ctx: &CartRuleContext,
        token: CancellationToken,
    ) -> Result<bool> {
        let result = self.execute_with_cancellation(rule_set, ctx, token).await?;
        if result.cancelled {
            return Err(RuleError::Cancelled);
        }
        Ok(result.matched)
    }

    /// 递归评估规则节点
    fn evaluate_node<'a>(
        &'a self,
        node: &'a RuleNode,
        scope: &'a Scope<'a>,
        path: String,
    ) -> BoxFuture<'a, Result<NodeReport>> {
        match node {
            RuleNode::Expression(expr) => self.evaluate_expression(expr, scope, path).boxed(),
            RuleNode::Group(set) => self.evaluate_group(set, scope, path).boxed(),
        }
    }

    /// 评估表达式节点
    async fn evaluate_expression(
        &self,
        expr: &RuleExpression,
        scope: &Scope<'_>,
        path: String,
    ) -> Result<NodeReport> {
        let mut report = NodeReport::default();

        let outcome = match self.registry.resolve(expr.descriptor()) {
            Ok(rule) => {
                tokio::select! {
                    biased;
                    _ = scope.interrupted() => Err(RuleError::Cancelled),
                    r = rule.match_expression(scope.ctx, expr) => r,
                }
            }
            Err(e) => Err(e),
        };

        let verdict = match outcome {
            Ok(matched) => {
                report.matched = matched;
                if matched {
                    report
                        .matched_expressions
                        .push(format!("{}: {}", path, expr));
                }
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            }
            Err(RuleError::Cancelled) => {
                report.cancelled = true;
                report.matched = self.options.cancellation_policy == CancellationPolicy::FailOpen;
                warn!(
                    path = %path,
                    rule = %expr.descriptor(),
                    policy = ?self.options.cancellation_policy,
                    "规则评估被取消"
                );
                report.failures.push(failure(&path, expr, &RuleError::Cancelled));
                "CANCELLED"
            }
            Err(e) if e.is_branch_local() => {
                if matches!(e, RuleError::UnknownRuleDescriptor(_)) {
                    error!(path = %path, rule = %expr.descriptor(), error = %e, "未注册的规则描述符");
                } else {
                    warn!(path = %path, rule = %expr.descriptor(), error = %e, "规则分支降级为不满足");
                }
                metrics::counter!(RULE_BRANCH_FAILURES_TOTAL, "code" => e.code()).increment(1);
                report.failures.push(failure(&path, expr, &e));
                "FAILED"
            }
            Err(e) => return Err(e),
        };

        if self.options.trace_enabled {
            report
                .trace
                .push(format!("{}: {} => {}", path, expr, verdict));
        }

        Ok(report)
    }

    /// 评估逻辑组节点（短路求值）
    async fn evaluate_group(
        &self,
        set: &RuleSet,
        scope: &Scope<'_>,
        path: String,
    ) -> Result<NodeReport> {
        let mut report = NodeReport::default();
        let op = set.logical_operator;

        if self.options.trace_enabled {
            report.trace.push(format!(
                "{}: 开始评估 {} 组 (共 {} 个子节点)",
                path,
                op,
                set.children.len()
            ));
        }

        let decided = match self.options.branch_mode {
            BranchMode::Sequential => self.evaluate_sequential(set, scope, &path, &mut report).await?,
            BranchMode::Concurrent => self.evaluate_concurrent(set, scope, &path, &mut report).await?,
        };

        match decided {
            Some(i) => {
                report.matched = op.decisive();
                if self.options.trace_enabled {
                    report.trace.push(format!(
                        "{}: {} 短路 - 子节点 {} {}",
                        path,
                        op,
                        i,
                        if op.decisive() { "匹配" } else { "不匹配" }
                    ));
                }
            }
            None => {
                report.matched = op.identity();
                if self.options.trace_enabled {
                    report.trace.push(format!(
                        "{}: {} 组{}",
                        path,
                        op,
                        if op.identity() { "全部匹配" } else { "无匹配" }
                    ));
                }
            }
        }

        Ok(report)
    }

    /// 按声明顺序评估，返回决定结果的子节点下标
    async fn evaluate_sequential(
        &self,
        set: &RuleSet,
        scope: &Scope<'_>,
        path: &str,
        report: &mut NodeReport,
    ) -> Result<Option<usize>> {
        let decisive = set.logical_operator.decisive();

        for (i, child) in set.children.iter().enumerate() {
            let child_path = format!("{}.children[{}]", path, i);
            let child_report = self.evaluate_node(child, scope, child_path).await?;
            let child_matched = child_report.matched;
            report.absorb(child_report);

            if child_matched == decisive {
                return Ok(Some(i));
            }
        }

        Ok(None)
    }

    /// 并发评估兄弟节点
    ///
    /// 结果与顺序评估一致：按下标找到第一个决定性结果或错误的子节点，
    /// 该下标之前的子节点必须全部完成，之后的子节点立即中止。报告按下标顺序合并。
    async fn evaluate_concurrent(
        &self,
        set: &RuleSet,
        scope: &Scope<'_>,
        path: &str,
        report: &mut NodeReport,
    ) -> Result<Option<usize>> {
        let decisive = set.logical_operator.decisive();
        let count = set.children.len();

        let mut handles: Vec<AbortHandle> = Vec::with_capacity(count);
        let mut in_flight: FuturesUnordered<_> = set
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| {
                let child_path = format!("{}.children[{}]", path, i);
                let (task, handle) = future::abortable(self.evaluate_node(child, scope, child_path));
                handles.push(handle);
                task.map(move |outcome| (i, outcome))
            })
            .collect();

        let mut outcomes: Vec<Option<Result<NodeReport>>> = (0..count).map(|_| None).collect();
        // 已知的最小决定性（或出错）下标
        let mut bound = count;
        // 该下标之前的子节点均已完成且不具决定性
        let mut settled = 0;

        while settled < bound {
            let Some((i, outcome)) = in_flight.next().await else {
                break;
            };
            // 已中止的分支
            let Ok(outcome) = outcome else {
                continue;
            };

            let stops = match &outcome {
                Ok(child_report) => child_report.matched == decisive,
                Err(_) => true,
            };
            outcomes[i] = Some(outcome);

            if stops && i < bound {
                for handle in &handles[i + 1..bound] {
                    handle.abort();
                }
                bound = i;
            }
            while settled < bound && outcomes[settled].is_some() {
                settled += 1;
            }
        }

        if !in_flight.is_empty() {
            debug!(path, dropped = in_flight.len(), "已得出结论，取消其余分支");
        }
        drop(in_flight);

        for (i, outcome) in outcomes.into_iter().enumerate() {
            let Some(outcome) = outcome else {
                break;
            };
            let child_report = outcome?;
            let child_matched = child_report.matched;
            report.absorb(child_report);

            if child_matched == decisive {
                return Ok(Some(i));
            }
        }

        Ok(None)
    }
}

fn failure(path: &str, expr: &RuleExpression, e: &RuleError) -> BranchFailure {
    BranchFailure {
        path: path.to_string(),
        descriptor: expr.descriptor().name().to_string(),
        code: e.code().to_string(),
        message: e.to_string(),
    }
}
