//! NCX导航数据结构定义

use std::collections::HashMap;

/// 导航点
#[derive(Debug, Clone)]
pub struct NavPoint {
    /// 声明的阅读位置（playOrder），不保证唯一
    pub order: u32,
    /// 唯一标识符
    pub id: String,
    /// 标签文本
    pub text: String,
    /// 相对链接目标（content元素的src属性）
    pub content_ref: String,
}

/// 解析后的导航文档
#[derive(Debug, Clone, Default)]
pub struct NavigationDocument {
    /// 文档标题（docTitle），缺失时为None
    pub title: Option<String>,
    /// 文档作者（docAuthor），缺失时为None
    pub author: Option<String>,
    /// 头部元数据（head/meta的name→content）
    pub metadata: HashMap<String, String>,
    /// 导航点映射，键为导航点id
    pub navigation_points: HashMap<String, NavPoint>,
}

impl NavigationDocument {
    /// 按声明的阅读位置返回导航点
    ///
    /// `navigation_points`以id为键，迭代顺序与阅读位置无关；
    /// 需要阅读顺序的调用方必须使用此视图。order相同时按id排序以保证确定性。
    pub fn sorted_points(&self) -> Vec<&NavPoint> {
        let mut points: Vec<&NavPoint> = self.navigation_points.values().collect();
        points.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        points
    }
}
