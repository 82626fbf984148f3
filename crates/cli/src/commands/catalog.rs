//! `agentflow catalog` — list configured agents and domains.

use std::path::PathBuf;

use agentflow_config::Catalog;
use agentflow_workflow::WorkflowType;

pub fn run(catalog: Option<PathBuf>) -> anyhow::Result<()> {
    let (_, catalog) = super::load(catalog)?;
    println!("{}", render(&catalog));
    Ok(())
}

fn render(catalog: &Catalog) -> String {
    let mut out = format!("Agents ({}):", catalog.agents.len());
    for id in catalog.agents.ids() {
        if let Some(agent) = catalog.agents.get(id) {
            out.push_str(&format!(
                "\n  {:<14} {:<28} {}",
                agent.handle(),
                agent.model,
                agent.capabilities.join(", ")
            ));
            if !agent.keywords.is_empty() {
                out.push_str(&format!(" [{}]", agent.keywords.join(", ")));
            }
        }
    }

    out.push_str(&format!("\n\nDomains ({}):", catalog.domains.len()));
    for domain in &catalog.domains {
        out.push_str(&format!(
            "\n  {:<14} {:<13} default={:<12} agents={}",
            domain.id,
            WorkflowType::for_domain(domain).as_str(),
            domain.default_agent,
            domain.agents.join(",")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_config::{AppConfig, CatalogFile};

    #[test]
    fn lists_agents_and_domains() {
        let catalog = toml::from_str::<CatalogFile>(CatalogFile::example_toml())
            .unwrap()
            .resolve(&AppConfig::default())
            .unwrap();

        let text = render(&catalog);
        assert!(text.starts_with("Agents (4):"));
        assert!(text.contains("@coder"));
        assert!(text.contains("[code, bug, implement, function]"));
        assert!(text.contains("Domains (4):"));
        assert!(text.contains("few_shot"));
    }
}
