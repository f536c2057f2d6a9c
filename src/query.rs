//! 列表接口的扁平查询语法编码
//!
//! ionline 的列表接口共用一套查询语法：每个过滤条件按列表位置
//! 展开为 `condition[i][key]` / `condition[i][value]` /
//! `condition[i][compare]`（显式指定连接符时追加
//! `condition[i][type]`），索引从 0 开始、严格连续；
//! 分页排序等选项对应固定参数名 limit/paged/orderby/order/select/with。

use std::fmt;

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    /// =
    Eq,
    /// ==
    EqStrict,
    /// <>
    Ne,
    /// >
    Gt,
    /// >=
    Gte,
    /// <
    Lt,
    /// <=
    Lte,
}

impl Compare {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compare::Eq => "=",
            Compare::EqStrict => "==",
            Compare::Ne => "<>",
            Compare::Gt => ">",
            Compare::Gte => ">=",
            Compare::Lt => "<",
            Compare::Lte => "<=",
        }
    }
}

/// 条件之间的逻辑连接符，服务端缺省按 and 处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joiner {
    And,
    Or,
}

impl Joiner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Joiner::And => "and",
            Joiner::Or => "or",
        }
    }
}

/// 单个过滤条件
///
/// 连接符是可选的：不指定就不编码，交给服务端缺省；
/// 线上抓包里也有显式写 and 的请求，所以指定了就照样输出。
#[derive(Debug, Clone)]
pub struct FilterCondition {
    pub field: String,
    pub value: String,
    pub compare: Compare,
    pub joiner: Option<Joiner>,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, compare: Compare, value: impl fmt::Display) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
            compare,
            joiner: None,
        }
    }

    /// 显式指定逻辑连接符
    pub fn joined(mut self, joiner: Joiner) -> Self {
        self.joiner = Some(joiner);
        self
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// 编码结果：有序的扁平参数表
pub type QueryParams = Vec<(String, String)>;

/// 列表查询构造器
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    limit: Option<u32>,
    paged: Option<u32>,
    orderby: Option<String>,
    order: Option<SortOrder>,
    select: Option<String>,
    with_relation: Option<String>,
    conditions: Vec<FilterCondition>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn paged(mut self, paged: u32) -> Self {
        self.paged = Some(paged);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.orderby = Some(field.into());
        self.order = Some(order);
        self
    }

    /// 字段裁剪列表，逗号分隔
    pub fn select(mut self, fields: impl Into<String>) -> Self {
        self.select = Some(fields.into());
        self
    }

    /// 预加载关联
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.with_relation = Some(relation.into());
        self
    }

    /// 追加一个过滤条件，编码索引即追加顺序
    pub fn condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// 编码为扁平参数表
    pub fn build(&self) -> QueryParams {
        let mut params = QueryParams::new();
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(paged) = self.paged {
            params.push(("paged".to_string(), paged.to_string()));
        }
        if let Some(orderby) = &self.orderby {
            params.push(("orderby".to_string(), orderby.clone()));
        }
        if let Some(order) = self.order {
            params.push(("order".to_string(), order.as_str().to_string()));
        }
        if let Some(select) = &self.select {
            params.push(("select".to_string(), select.clone()));
        }
        if let Some(relation) = &self.with_relation {
            params.push(("with".to_string(), relation.clone()));
        }
        for (index, condition) in self.conditions.iter().enumerate() {
            params.push((
                format!("condition[{}][key]", index),
                condition.field.clone(),
            ));
            params.push((
                format!("condition[{}][value]", index),
                condition.value.clone(),
            ));
            params.push((
                format!("condition[{}][compare]", index),
                condition.compare.as_str().to_string(),
            ));
            if let Some(joiner) = condition.joiner {
                params.push((
                    format!("condition[{}][type]", index),
                    joiner.as_str().to_string(),
                ));
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of<'a>(params: &'a QueryParams, key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_every_condition_gets_contiguous_triplet() {
        let inputs = [
            ("student_id", Compare::Eq, "123"),
            ("week", Compare::EqStrict, "7"),
            ("class_id", Compare::Ne, "1000"),
        ];
        let mut query = ListQuery::new();
        for (field, compare, value) in inputs.iter() {
            query = query.condition(FilterCondition::new(*field, *compare, value));
        }
        let params = query.build();

        for (i, (field, compare, value)) in inputs.iter().enumerate() {
            assert_eq!(
                value_of(&params, &format!("condition[{}][key]", i)),
                Some(*field)
            );
            assert_eq!(
                value_of(&params, &format!("condition[{}][value]", i)),
                Some(*value)
            );
            assert_eq!(
                value_of(&params, &format!("condition[{}][compare]", i)),
                Some(compare.as_str())
            );
        }
        // 没有第四个条件的索引
        assert_eq!(value_of(&params, "condition[3][key]"), None);
    }

    #[test]
    fn test_joiner_emitted_only_when_specified() {
        let params = ListQuery::new()
            .condition(FilterCondition::new("week", Compare::EqStrict, 7))
            .condition(FilterCondition::new("class_id", Compare::EqStrict, 42).joined(Joiner::And))
            .build();

        assert_eq!(value_of(&params, "condition[0][type]"), None);
        assert_eq!(value_of(&params, "condition[1][type]"), Some("and"));
    }

    #[test]
    fn test_options_map_to_fixed_parameter_names() {
        let params = ListQuery::new()
            .limit(1000)
            .paged(1)
            .order_by("week", SortOrder::Asc)
            .select("id,week,title")
            .with_relation("managers")
            .build();

        assert_eq!(value_of(&params, "limit"), Some("1000"));
        assert_eq!(value_of(&params, "paged"), Some("1"));
        assert_eq!(value_of(&params, "orderby"), Some("week"));
        assert_eq!(value_of(&params, "order"), Some("ASC"));
        assert_eq!(value_of(&params, "select"), Some("id,week,title"));
        assert_eq!(value_of(&params, "with"), Some("managers"));
    }

    #[test]
    fn test_empty_query_builds_empty_params() {
        assert!(ListQuery::new().build().is_empty());
    }
}
