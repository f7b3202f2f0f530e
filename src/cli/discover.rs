//! `discover-partitions`: print a topic's partitions and watermarks

use crate::client::BrokerClient;
use crate::error::Result;
use crate::fault::FaultMonitor;
use crate::mirror::discover_watermarks;
use crate::types::Watermarks;
use std::io::Write;
use std::time::Duration;

/// Discover `topic` and print its partition table
pub async fn discover_partitions<C, W>(
    client: &mut C,
    topic: &str,
    poll_timeout: Duration,
    monitor: &FaultMonitor,
    out: &mut W,
) -> Result<Vec<Watermarks>>
where
    C: BrokerClient + ?Sized,
    W: Write + Send,
{
    let watermarks = discover_watermarks(client, topic, poll_timeout, monitor).await?;
    render(topic, &watermarks, out)?;
    Ok(watermarks)
}

/// Write the partition table
pub fn render<W: Write + ?Sized>(topic: &str, watermarks: &[Watermarks], out: &mut W) -> Result<()> {
    writeln!(out, "{} partitions for '{topic}'", watermarks.len())?;
    writeln!(out, "{:<10}{:<20}Last Assigned", "Partition", "First Available")?;
    for (partition, wm) in watermarks.iter().enumerate() {
        let last = wm
            .high_watermark
            .map_or_else(|| "-".to_string(), |hwm| hwm.to_string());
        writeln!(out, "{partition:<10}{:<20}{last}", wm.first_available)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryBroker;
    use crate::types::Message;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render() {
        let mut out = Vec::new();
        render("events", &[Watermarks::new(0, 41), Watermarks::empty()], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "2 partitions for 'events'\n\
             Partition First Available     Last Assigned\n\
             0         0                   41\n\
             1         0                   -\n"
        );
    }

    #[tokio::test]
    async fn test_discover_partitions() {
        let broker = MemoryBroker::new();
        broker.create_topic("events", 3);
        broker.append("events", 2, [Message::new("x")]);

        let mut out = Vec::new();
        let watermarks = discover_partitions(
            &mut broker.client("b"),
            "events",
            Duration::from_millis(10),
            &FaultMonitor::abort_on_any(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(watermarks.len(), 3);
        assert!(String::from_utf8(out).unwrap().starts_with("3 partitions for 'events'\n"));
    }
}
