use crate::api::ApiClient;
use crate::config::Config;
use crate::models::{ClassDetail, TestDetail, TestResult};
use crate::services::{group_by_term, plan_weeks, TermClasses};
use crate::session::SessionQueries;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    queries: SessionQueries,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        // 读取抓包文件
        let capture_text = tokio::fs::read_to_string(&config.capture_file)
            .await
            .with_context(|| format!("无法读取抓包文件: {}", config.capture_file))?;

        let client = Arc::new(ApiClient::new(&config)?);

        // 建立会话（缺学生 id 时走 user-profile 回退）
        let queries = match SessionQueries::establish(
            client,
            &capture_text,
            Duration::from_secs(config.cache_fresh_secs),
        )
        .await
        {
            Ok(queries) => queries,
            Err(e) => {
                if e.is_credential() {
                    error!("❌ 会话建立失败: {}", e);
                    info!("💡 请从浏览器开发者工具复制一个完整的 ionline 请求（含全部请求头）到 {}", config.capture_file);
                }
                return Err(e.into());
            }
        };

        Ok(Self { config, queries })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let mut stats = ReportStats::default();

        // 班级列表，按学期分组
        let classes = self.queries.classes().await.into_result()?;
        stats.classes = classes.len();
        let groups = group_by_term(&classes);
        log_terms(&groups);

        // 班级选择：配置优先，其次抓包里带的 class_id
        let class_id = self.config.class_id.or(self.queries.context().class_id);
        let class_id = match class_id {
            Some(id) => id,
            None => {
                info!("💡 未选择班级，设置 CLASS_ID 后可查看周成绩");
                print_final_stats(&stats, self.queries.cache().len());
                return Ok(());
            }
        };

        // 班级详情拉不到不阻断成绩钻取
        match self.queries.class_detail(Some(class_id)).await.into_result() {
            Ok(detail) => log_class_detail(&detail),
            Err(e) => warn!("⚠️ 班级详情拉取失败: {}", e),
        }

        // 课程计划给出要查的周
        let plan = self.queries.course_plan(Some(class_id)).await.into_result()?;
        let weeks = match self.config.week {
            Some(week) => vec![week],
            None => plan_weeks(&plan),
        };
        info!("📋 课程计划 {} 条，覆盖 {} 周", plan.len(), weeks.len());
        stats.weeks = weeks.len();

        // 逐周成绩并发拉取
        let week_snapshots = futures::future::join_all(weeks.iter().map(|&week| {
            let queries = &self.queries;
            async move {
                (
                    week,
                    queries.test_results(Some(class_id), Some(week)).await,
                )
            }
        }))
        .await;

        for (week, snapshot) in week_snapshots {
            match snapshot.into_result() {
                Ok(results) => {
                    stats.tests += results.len();
                    stats.passed += results.iter().filter(|r| r.is_passed()).count();
                    log_week_results(week, &results);
                }
                Err(e) => {
                    stats.failed_weeks += 1;
                    warn!("⚠️ 第 {} 周成绩拉取失败: {}", week, e);
                }
            }
        }

        // 选了具体测验再下钻题目级详情
        if let Some(test_id) = self.config.test_id {
            self.report_test_detail(test_id).await;
        }

        print_final_stats(&stats, self.queries.cache().len());
        Ok(())
    }

    async fn report_test_detail(&self, test_id: i64) {
        match self.queries.test_detail(Some(test_id)).await.into_result() {
            Ok(detail) => match detail.as_ref() {
                Some(detail) => log_test_detail(detail),
                None => warn!("⚠️ 找不到测验: test_id={}", test_id),
            },
            Err(e) => warn!("⚠️ 测验详情拉取失败: {}", e),
        }
    }
}

/// 报表统计
#[derive(Debug, Default)]
struct ReportStats {
    classes: usize,
    weeks: usize,
    failed_weeks: usize,
    tests: usize,
    passed: usize,
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - ICTU 成绩查询");
    info!("📄 抓包文件: {}", config.capture_file);
    info!("📊 缓存新鲜期: {} 秒", config.cache_fresh_secs);
    info!("{}", "=".repeat(60));
}

fn log_terms(groups: &[TermClasses]) {
    info!("✓ 共 {} 个学期", groups.len());
    for group in groups {
        info!(
            "📚 {} 学期 {}: {} 个班级 {:?}",
            group.year,
            group.semester,
            group.class_ids.len(),
            group.class_ids
        );
    }
}

fn log_class_detail(detail: &ClassDetail) {
    info!(
        "🏫 班级 {} [{}] {} 学分, {} 学期 {}",
        detail.name, detail.kyhieu, detail.sotinchi, detail.namhoc, detail.hocky
    );
    for manager in &detail.managers {
        info!("👤 教师: {} <{}>", manager.display_name, manager.email);
    }
}

fn log_week_results(week: i64, results: &[TestResult]) {
    if results.is_empty() {
        info!("📊 第 {} 周: 无测验", week);
        return;
    }
    info!("📊 第 {} 周: {} 场测验", week, results.len());
    for result in results {
        let mark = if result.is_passed() { "✅" } else { "❌" };
        info!(
            "   {} 测验 {}: {:.1} 分 (及格线 {:.1}), 提交于 {}",
            mark,
            result.id,
            result.tong_diem,
            result.passing_point,
            result.submit_at.as_deref().unwrap_or("-")
        );
    }
}

fn log_test_detail(detail: &TestDetail) {
    info!(
        "🔍 测验 {}: {} 题, 限时 {} 分钟",
        detail.id,
        detail.test.len(),
        detail.time
    );
    for question in &detail.test {
        info!(
            "   📄 第 {} 题 [{}]: {} ({} 个选项, {} 个正确)",
            question.question_number,
            question.code,
            plain_excerpt(&question.question_direction),
            question.answer_option.len(),
            question.number_answer_correct
        );
    }
}

fn print_final_stats(stats: &ReportStats, cached_entries: usize) {
    info!("{}", "=".repeat(60));
    info!("📊 查询完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 班级: {} 个", stats.classes);
    info!("✅ 覆盖周数: {} (失败 {})", stats.weeks, stats.failed_weeks);
    info!("✅ 测验: {} 场, 通过 {} 场", stats.tests, stats.passed);
    info!("📦 缓存条目: {}", cached_entries);
    info!("{}", "=".repeat(60));
}

/// 把题干 HTML 压成一行纯文本摘要
fn plain_excerpt(html: &str) -> String {
    let text = Regex::new(r"<[^>]*>")
        .map(|re| re.replace_all(html, "").to_string())
        .unwrap_or_else(|_| html.to_string());
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() > 60 {
        let mut cut: String = text.chars().take(60).collect();
        cut.push('…');
        cut
    } else {
        text
    }
}
