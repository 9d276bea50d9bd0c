use crate::schema::{CategoryId, CategoryTaxonomy, FlowType, MainCategory, SubCategory};
use std::collections::HashMap;

impl CategoryTaxonomy {
    /// Main categories that apply to one direction of cash flow.
    pub fn for_flow(&self, flow_type: FlowType) -> &[MainCategory] {
        match flow_type {
            FlowType::Inflow => &self.revenue,
            FlowType::Outflow => &self.expense,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Section,Main Category,Sub Category\n");

        for (section, mains) in [("Revenue", &self.revenue), ("Expense", &self.expense)] {
            for main in mains {
                for sub in &main.sub_categories {
                    output.push_str(&format!("{},{},{}\n", section, main.name, sub.name));
                }
            }
        }

        output
    }
}

/// Resolves sub-category references (stable id first, label as fallback)
/// to their main category for one flow direction.
pub struct CategoryIndex<'a> {
    mains: &'a [MainCategory],
    by_id: HashMap<CategoryId, usize>,
    by_name: HashMap<&'a str, usize>,
}

impl<'a> CategoryIndex<'a> {
    pub fn new(taxonomy: &'a CategoryTaxonomy, flow_type: FlowType) -> Self {
        let mains = taxonomy.for_flow(flow_type);
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();

        for (index, main) in mains.iter().enumerate() {
            for sub in &main.sub_categories {
                by_id.entry(sub.id).or_insert(index);
                by_name.entry(sub.name.as_str()).or_insert(index);
            }
        }

        Self {
            mains,
            by_id,
            by_name,
        }
    }

    pub fn mains(&self) -> &'a [MainCategory] {
        self.mains
    }

    /// Position of the main category owning the referenced sub-category.
    pub fn position(&self, category_id: Option<CategoryId>, label: &str) -> Option<usize> {
        category_id
            .and_then(|id| self.by_id.get(&id).copied())
            .or_else(|| self.by_name.get(label).copied())
    }

    pub fn main_for(&self, category_id: Option<CategoryId>, label: &str) -> Option<&'a MainCategory> {
        self.position(category_id, label).map(|i| &self.mains[i])
    }

    pub fn sub_category(&self, category_id: Option<CategoryId>, label: &str) -> Option<&'a SubCategory> {
        let main = self.main_for(category_id, label)?;
        main.sub_categories
            .iter()
            .find(|sub| Some(sub.id) == category_id)
            .or_else(|| main.sub_categories.iter().find(|sub| sub.name == label))
    }
}

/// Whether a `(category_id, label)` reference points at `sub`.
pub fn references(sub: &SubCategory, category_id: Option<CategoryId>, label: &str) -> bool {
    match category_id {
        Some(id) if id == sub.id => true,
        _ => sub.name == label,
    }
}
