//! Parser for the `CLUSTER NODES` text listing
//!
//! Line layout:
//! `<id> <ip:port@cport[,hostname]> <flags> <master> <ping> <pong> <epoch> <link> <slot>...`

use tracing::debug;

use crate::domain::entities::Endpoint;

/// One node as seen by the member that produced the listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNodeInfo {
    pub id: String,
    pub endpoint: Endpoint,
    pub flags: Vec<String>,
    pub master_id: Option<String>,
    pub link_state: String,
    /// Inclusive slot ranges served by this node
    pub slots: Vec<(u16, u16)>,
}

impl ClusterNodeInfo {
    pub fn is_master(&self) -> bool {
        self.has_flag("master")
    }

    pub fn is_replica(&self) -> bool {
        self.has_flag("slave") || self.has_flag("replica")
    }

    pub fn is_failed(&self) -> bool {
        self.has_flag("fail") || self.has_flag("fail?")
    }

    pub fn owns_slot(&self, slot: u16) -> bool {
        self.slots
            .iter()
            .any(|(start, end)| *start <= slot && slot <= *end)
    }

    fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Parse a full listing. Lines without a usable address (nodes still in
/// handshake print `:0@0`) are skipped.
pub fn parse_cluster_nodes(listing: &str) -> Vec<ClusterNodeInfo> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let parsed = parse_line(line);
            if parsed.is_none() {
                debug!(line = line, "Skipping unparseable CLUSTER NODES line");
            }
            parsed
        })
        .collect()
}

fn parse_line(line: &str) -> Option<ClusterNodeInfo> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 8 {
        return None;
    }

    let address = fields[1].split(',').next()?;
    let endpoint: Endpoint = address.parse().ok()?;
    let master_id = match fields[3] {
        "-" => None,
        id => Some(id.to_string()),
    };

    let slots = fields[8..]
        .iter()
        // [slot->-id] and [slot-<-id] mark migrations in progress
        .filter(|field| !field.starts_with('['))
        .filter_map(|field| parse_slot_field(field))
        .collect();

    Some(ClusterNodeInfo {
        id: fields[0].to_string(),
        endpoint,
        flags: fields[2].split(',').map(str::to_string).collect(),
        master_id,
        link_state: fields[7].to_string(),
        slots,
    })
}

fn parse_slot_field(field: &str) -> Option<(u16, u16)> {
    match field.split_once('-') {
        Some((start, end)) => Some((start.parse().ok()?, end.parse().ok()?)),
        None => {
            let slot = field.parse().ok()?;
            Some((slot, slot))
        }
    }
}

pub fn find_by_endpoint<'a>(
    nodes: &'a [ClusterNodeInfo],
    endpoint: &Endpoint,
) -> Option<&'a ClusterNodeInfo> {
    nodes.iter().find(|node| &node.endpoint == endpoint)
}

/// The master currently serving `slot`, if any
pub fn slot_owner(nodes: &[ClusterNodeInfo], slot: u16) -> Option<&ClusterNodeInfo> {
    nodes
        .iter()
        .find(|node| node.is_master() && node.owns_slot(slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
07c37dfeb235213a872192d90877d0cd55635b91 10.0.0.1:7000@17000 myself,master - 0 1426238317239 1 connected 0-5460 [5461->-e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca]
e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 10.0.0.2:7000@17000,redis-2 master - 0 1426238316232 2 connected 5461-10922 [5461-<-07c37dfeb235213a872192d90877d0cd55635b91]
292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 10.0.0.3:7000@17000 master - 0 1426238318243 3 connected 10923-16383
6ec23923021cf3ffec47632106199cb7f496ce01 10.0.0.4:7000@17000 slave 07c37dfeb235213a872192d90877d0cd55635b91 0 1426238316232 1 connected
824fe116063bc5fcf9f4ffd895bc17aee7731ac3 10.0.0.5:7000@17000 master,fail - 1426238316232 1426238316232 0 disconnected 42
a1b2c3 :0@0 handshake,noaddr - 0 0 0 disconnected
";

    #[test]
    fn test_parse_listing() {
        let nodes = parse_cluster_nodes(LISTING);
        assert_eq!(nodes.len(), 5);

        let first = &nodes[0];
        assert_eq!(first.id, "07c37dfeb235213a872192d90877d0cd55635b91");
        assert_eq!(first.endpoint, Endpoint::new("10.0.0.1", 7000));
        assert!(first.is_master());
        assert_eq!(first.slots, vec![(0, 5460)]);
        assert_eq!(first.link_state, "connected");
    }

    #[test]
    fn test_hostname_suffix_and_migration_markers() {
        let nodes = parse_cluster_nodes(LISTING);
        let second = &nodes[1];
        assert_eq!(second.endpoint, Endpoint::new("10.0.0.2", 7000));
        assert_eq!(second.slots, vec![(5461, 10922)]);
    }

    #[test]
    fn test_replica_and_failed_flags() {
        let nodes = parse_cluster_nodes(LISTING);
        let replica = &nodes[3];
        assert!(replica.is_replica());
        assert_eq!(
            replica.master_id.as_deref(),
            Some("07c37dfeb235213a872192d90877d0cd55635b91")
        );
        assert!(replica.slots.is_empty());

        let failed = &nodes[4];
        assert!(failed.is_failed());
        assert_eq!(failed.slots, vec![(42, 42)]);
    }

    #[test]
    fn test_lookups() {
        let nodes = parse_cluster_nodes(LISTING);
        let found = find_by_endpoint(&nodes, &Endpoint::new("10.0.0.3", 7000)).unwrap();
        assert_eq!(found.id, "292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f");
        assert!(find_by_endpoint(&nodes, &Endpoint::new("10.0.0.9", 7000)).is_none());

        assert_eq!(slot_owner(&nodes, 100).unwrap().endpoint.host, "10.0.0.1");
        assert_eq!(slot_owner(&nodes, 16383).unwrap().endpoint.host, "10.0.0.3");
    }

    #[test]
    fn test_garbage_is_skipped() {
        assert!(parse_cluster_nodes("not a listing\n\n").is_empty());
    }
}
