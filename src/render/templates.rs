use anyhow::{Context, Result};
use tera::Tera;

pub const TEMPLATE_NAME: &str = "underlay";

/// EOS-style interface + underlay BGP configuration.
///
/// Block order is fixed: hostname, interfaces, router bgp with the peer
/// group and neighbors, then the address-family activations.
pub const UNDERLAY_TEMPLATE: &str = r#"hostname {{ hostname }}
!
{% for iface in interfaces %}interface {{ iface.name }}
{% if iface.description %}   description {{ iface.description }}
{% endif %}{% if iface.routed %}   no switchport
{% endif %}{% if iface.address %}   ip address {{ iface.address }}
{% endif %}{% if iface.routed %}   mtu {{ mtu }}
{% endif %}   no shutdown
!
{% endfor %}router bgp {{ asn }}
   router-id {{ router_id }}
   no bgp default ipv4-unicast
   maximum-paths {{ policy.maximum_paths }} ecmp {{ policy.maximum_paths }}
   neighbor {{ peer_group }} peer group
   neighbor {{ peer_group }} ebgp-multihop {{ policy.ebgp_multihop }}
{% if policy.send_community %}   neighbor {{ peer_group }} {{ policy.send_community }}
{% endif %}   neighbor {{ peer_group }} maximum-routes {{ policy.maximum_routes }}
{% for n in neighbors %}   neighbor {{ n.address }} peer group {{ peer_group }}
   neighbor {{ n.address }} remote-as {{ n.remote_as }}
   neighbor {{ n.address }} description {{ n.description }}
{% endfor %}   !
   address-family ipv4
{% for address in activations %}      neighbor {{ address }} activate
{% endfor %}!
end
"#;

/// Build the template set, preferring `override_path` when given
pub fn load_templates(override_path: Option<&str>) -> Result<Tera> {
    let content = match override_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path))?,
        None => UNDERLAY_TEMPLATE.to_string(),
    };

    let mut tera = Tera::default();
    tera.add_raw_template(TEMPLATE_NAME, &content)
        .map_err(|e| anyhow::anyhow!("Invalid template: {}", e))?;
    Ok(tera)
}

/// Peer-group line for a community propagation setting, `None` to omit it
pub fn send_community_line(setting: &str) -> Option<String> {
    match setting.trim().to_ascii_lowercase().as_str() {
        "" | "none" => None,
        "all" => Some("send-community".to_string()),
        other => Some(format!("send-community {}", other)),
    }
}
