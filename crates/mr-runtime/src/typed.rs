use mr_command::CommandError;
use mr_protocol::Reply;

use crate::Client;

macro_rules! typed_commands {
    ($($method:ident => $name:literal),* $(,)?) => {
        /// Command names reachable through a generated method.
        #[cfg(test)]
        const TYPED_COMMAND_NAMES: &[&str] = &[$($name),*];

        impl Client {
            $(
                #[doc = concat!("Runs `", $name, "` with `args`.")]
                pub fn $method<I, A>(&mut self, args: I) -> Result<Reply, CommandError>
                where
                    I: IntoIterator<Item = A>,
                    A: AsRef<[u8]>,
                {
                    self.call($name, args)
                }
            )*
        }
    };
}

typed_commands! {
    ping => "ping",
    echo => "echo",
    time => "time",
    select => "select",
    swapdb => "swapdb",
    dbsize => "dbsize",
    flushdb => "flushdb",
    flushall => "flushall",
    del => "del",
    unlink => "unlink",
    exists => "exists",
    key_type => "type",
    keys => "keys",
    randomkey => "randomkey",
    rename => "rename",
    renamenx => "renamenx",
    move_key => "move",
    touch => "touch",
    expire => "expire",
    pexpire => "pexpire",
    expireat => "expireat",
    pexpireat => "pexpireat",
    ttl => "ttl",
    pttl => "pttl",
    persist => "persist",
    dump => "dump",
    restore => "restore",
    get => "get",
    set => "set",
    setnx => "setnx",
    setex => "setex",
    psetex => "psetex",
    getset => "getset",
    getdel => "getdel",
    mget => "mget",
    mset => "mset",
    msetnx => "msetnx",
    append => "append",
    strlen => "strlen",
    getrange => "getrange",
    setrange => "setrange",
    incr => "incr",
    decr => "decr",
    incrby => "incrby",
    decrby => "decrby",
    incrbyfloat => "incrbyfloat",
    setbit => "setbit",
    getbit => "getbit",
    bitcount => "bitcount",
    bitop => "bitop",
    hset => "hset",
    hsetnx => "hsetnx",
    hmset => "hmset",
    hget => "hget",
    hmget => "hmget",
    hdel => "hdel",
    hexists => "hexists",
    hlen => "hlen",
    hkeys => "hkeys",
    hvals => "hvals",
    hgetall => "hgetall",
    hstrlen => "hstrlen",
    hincrby => "hincrby",
    hincrbyfloat => "hincrbyfloat",
    lpush => "lpush",
    rpush => "rpush",
    lpushx => "lpushx",
    rpushx => "rpushx",
    lpop => "lpop",
    rpop => "rpop",
    llen => "llen",
    lrange => "lrange",
    lindex => "lindex",
    linsert => "linsert",
    lrem => "lrem",
    lset => "lset",
    ltrim => "ltrim",
    rpoplpush => "rpoplpush",
    sadd => "sadd",
    srem => "srem",
    smembers => "smembers",
    scard => "scard",
    sismember => "sismember",
    spop => "spop",
    srandmember => "srandmember",
    smove => "smove",
    sdiff => "sdiff",
    sinter => "sinter",
    sunion => "sunion",
    sdiffstore => "sdiffstore",
    sinterstore => "sinterstore",
    sunionstore => "sunionstore",
    zadd => "zadd",
    zincrby => "zincrby",
    zrem => "zrem",
    zcard => "zcard",
    zscore => "zscore",
    zrank => "zrank",
    zrevrank => "zrevrank",
    zrange => "zrange",
    zrevrange => "zrevrange",
    zrangebyscore => "zrangebyscore",
    zrevrangebyscore => "zrevrangebyscore",
    zrangebylex => "zrangebylex",
    zrevrangebylex => "zrevrangebylex",
    zcount => "zcount",
    zlexcount => "zlexcount",
    zremrangebyscore => "zremrangebyscore",
    zremrangebylex => "zremrangebylex",
    zremrangebyrank => "zremrangebyrank",
    geoadd => "geoadd",
    geodist => "geodist",
    geohash => "geohash",
    geopos => "geopos",
}

impl Client {
    pub fn multi(&mut self) -> Result<Reply, CommandError> {
        self.execute(["multi"])
    }

    pub fn exec(&mut self) -> Result<Reply, CommandError> {
        self.execute(["exec"])
    }

    pub fn discard(&mut self) -> Result<Reply, CommandError> {
        self.execute(["discard"])
    }

    /// `HMSET` from a field/value mapping, flattened in iteration order.
    pub fn hmset_map<K, F, V, M>(&mut self, key: K, fields: M) -> Result<Reply, CommandError>
    where
        K: AsRef<[u8]>,
        F: AsRef<[u8]>,
        V: AsRef<[u8]>,
        M: IntoIterator<Item = (F, V)>,
    {
        let mut args = vec![key.as_ref().to_vec()];
        for (field, value) in fields {
            args.push(field.as_ref().to_vec());
            args.push(value.as_ref().to_vec());
        }
        self.call("hmset", args)
    }
}
